//! Control Locator
//!
//! Resolves a logical field to a concrete, visible control across widget
//! families. Resolution is a pure function over a snapshot of the page's
//! controls, so it can be exercised against synthetic fixtures.

use anyhow::Result;
use reportflow_browser::{ControlHandle, ControlInfo, ControlKind, ReportPage, normalize_text};
use tracing::debug;

use crate::models::{FieldSpec, LocatedControl, LocatorStrategy, SelectorDescriptor, WidgetKind};

pub struct ControlLocator;

impl ControlLocator {
    /// Find the control for `field`, or `None` when every candidate locator misses.
    ///
    /// Only transport failures surface as errors; "not found" is a value.
    pub async fn locate(page: &dyn ReportPage, field: &FieldSpec) -> Result<Option<LocatedControl>> {
        let controls = page.controls().await?;
        let located = resolve(&controls, field);
        match &located {
            Some(found) => debug!(
                field = %field.logical_name,
                handle = %found.control.handle,
                widget = ?found.widget,
                strategy = ?found.strategy,
                "Control located"
            ),
            None => debug!(field = %field.logical_name, "No candidate locator matched"),
        }
        Ok(located)
    }

    /// Last resort: any control whose option list contains `wanted`.
    pub async fn scan_for_option(
        page: &dyn ReportPage,
        field: &FieldSpec,
        wanted: &str,
    ) -> Result<Option<LocatedControl>> {
        let controls = page.controls().await?;
        Ok(scan_for_option(&controls, field, wanted))
    }
}

/// Try each candidate locator in order and commit to the first visible match.
pub fn resolve(controls: &[ControlInfo], field: &FieldSpec) -> Option<LocatedControl> {
    for descriptor in &field.candidate_locators {
        let hit = controls
            .iter()
            .filter(|control| matches_descriptor(control, descriptor, field))
            .find_map(|control| commit(controls, control, field, descriptor.strategy()));
        if hit.is_some() {
            return hit;
        }
    }
    None
}

pub fn scan_for_option(
    controls: &[ControlInfo],
    field: &FieldSpec,
    wanted: &str,
) -> Option<LocatedControl> {
    controls
        .iter()
        .filter(|control| control.kind == ControlKind::Select && control.has_option(wanted))
        .find_map(|control| commit(controls, control, field, LocatorStrategy::OptionScan))
}

/// Human-readable list of what the locator tries for `field`.
pub fn attempted_descriptions(field: &FieldSpec, scanned_for: Option<&str>) -> Vec<String> {
    let mut attempted: Vec<String> = field
        .candidate_locators
        .iter()
        .map(ToString::to_string)
        .collect();
    if let Some(wanted) = scanned_for {
        attempted.push(format!("option scan for '{}'", wanted));
    }
    attempted
}

fn matches_descriptor(
    control: &ControlInfo,
    descriptor: &SelectorDescriptor,
    field: &FieldSpec,
) -> bool {
    match descriptor {
        SelectorDescriptor::Label(text) => {
            field.role.accepts(control.kind)
                && control
                    .label
                    .as_deref()
                    .is_some_and(|label| label_matches(label, text))
        }
        SelectorDescriptor::IdFragment(fragment) => {
            field.role.accepts(control.kind) && contains_fragment(control.id.as_deref(), fragment)
        }
        SelectorDescriptor::NameFragment(fragment) => {
            field.role.accepts(control.kind)
                && contains_fragment(control.name.as_deref(), fragment)
        }
        SelectorDescriptor::Structural { kind, near_text } => {
            control.kind == *kind
                && match near_text {
                    Some(text) => control
                        .group_text
                        .as_deref()
                        .is_some_and(|group| normalize_text(group).contains(&normalize_text(text))),
                    None => true,
                }
        }
    }
}

/// Turn a matching control into a committed, visible target.
fn commit(
    controls: &[ControlInfo],
    control: &ControlInfo,
    field: &FieldSpec,
    strategy: LocatorStrategy,
) -> Option<LocatedControl> {
    let find = |handle: &ControlHandle| controls.iter().find(|c| &c.handle == handle);

    match control.kind {
        ControlKind::OverlayTrigger if control.visible => Some(LocatedControl {
            control: control.clone(),
            widget: WidgetKind::OverlayMenu,
            strategy,
            backing: control.backing.as_ref().and_then(find).cloned(),
        }),
        ControlKind::Select => {
            let overlay = control
                .overlay_trigger
                .as_ref()
                .and_then(find)
                .filter(|trigger| trigger.visible);
            let prefer_overlay = field.widget_kind == WidgetKind::OverlayMenu || !control.visible;
            match overlay {
                Some(trigger) if prefer_overlay => Some(LocatedControl {
                    control: trigger.clone(),
                    widget: WidgetKind::OverlayMenu,
                    strategy,
                    backing: Some(control.clone()),
                }),
                _ if control.visible => Some(LocatedControl {
                    control: control.clone(),
                    widget: WidgetKind::Native,
                    strategy,
                    backing: None,
                }),
                _ => None,
            }
        }
        ControlKind::Input if control.visible => Some(LocatedControl {
            control: control.clone(),
            widget: WidgetKind::Native,
            strategy,
            backing: None,
        }),
        _ => None,
    }
}

fn label_matches(label: &str, wanted: &str) -> bool {
    let label = normalize_text(label);
    let label = label.trim_end_matches(|c: char| c == '*' || c == ':' || c.is_whitespace());
    let wanted = normalize_text(wanted);
    label == wanted || label.starts_with(&format!("{} ", wanted))
}

fn contains_fragment(value: Option<&str>, fragment: &str) -> bool {
    value.is_some_and(|value| {
        value
            .to_ascii_lowercase()
            .contains(&fragment.to_ascii_lowercase())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reportflow_browser::OptionInfo;

    fn select(handle: &str, label: Option<&str>, options: &[&str]) -> ControlInfo {
        let mut control = ControlInfo::new(handle, ControlKind::Select);
        control.label = label.map(str::to_string);
        control.options = options.iter().map(|text| OptionInfo::new(*text)).collect();
        control
    }

    fn overlay(handle: &str, backing: &str) -> ControlInfo {
        let mut control = ControlInfo::new(handle, ControlKind::OverlayTrigger);
        control.backing = Some(ControlHandle::new(backing));
        control
    }

    #[test]
    fn label_match_on_visible_native_control() {
        let controls = vec![
            select("c1", Some("Status"), &["DELAYED"]),
            select("c2", Some("Division Office *"), &["R1", "R2"]),
        ];
        let field = FieldSpec::choice("Division Office", &["division"]);

        let located = resolve(&controls, &field).unwrap();
        assert_eq!(located.control.handle.as_str(), "c2");
        assert_eq!(located.widget, WidgetKind::Native);
        assert_eq!(located.strategy, LocatorStrategy::Label);
    }

    #[test]
    fn hidden_select_resolves_to_its_overlay_trigger() {
        let mut hidden = select("c1", Some("Nature"), &["Civil", "Mechanical"]);
        hidden.visible = false;
        hidden.overlay_trigger = Some(ControlHandle::new("c2"));
        let controls = vec![hidden, overlay("c2", "c1")];
        let field = FieldSpec::choice("Nature", &["nature"]);

        let located = resolve(&controls, &field).unwrap();
        assert_eq!(located.control.handle.as_str(), "c2");
        assert_eq!(located.widget, WidgetKind::OverlayMenu);
        assert_eq!(located.backing.unwrap().handle.as_str(), "c1");
    }

    #[test]
    fn declared_overlay_prefers_trigger_even_when_select_is_visible() {
        let mut native = select("c1", Some("Nature"), &["Civil"]);
        native.overlay_trigger = Some(ControlHandle::new("c2"));
        let controls = vec![native, overlay("c2", "c1")];
        let field = FieldSpec::choice("Nature", &[]).with_widget(WidgetKind::OverlayMenu);

        let located = resolve(&controls, &field).unwrap();
        assert_eq!(located.widget, WidgetKind::OverlayMenu);
    }

    #[test]
    fn falls_back_to_identifier_fragment() {
        let mut control = select("c1", None, &["S1"]);
        control.id = Some("ctl00_ddlSubDivision".to_string());
        let field = FieldSpec::choice("Sub Division", &["subdivision"]);

        let located = resolve(&[control], &field).unwrap();
        assert_eq!(located.strategy, LocatorStrategy::Identifier);
    }

    #[test]
    fn falls_back_to_structural_pattern() {
        let mut control = select("c1", None, &["DELAYED"]);
        control.group_text = Some("Status DELAYED PENDING".to_string());
        let field = FieldSpec::choice("Status", &["zzz"]);

        let located = resolve(&[control], &field).unwrap();
        assert_eq!(located.strategy, LocatorStrategy::Structural);
    }

    #[test]
    fn invisible_controls_without_overlay_are_skipped() {
        let mut hidden = select("c1", Some("Status"), &["DELAYED"]);
        hidden.visible = false;
        let visible = {
            let mut control = select("c2", None, &["DELAYED"]);
            control.name = Some("status".to_string());
            control
        };
        let field = FieldSpec::choice("Status", &["status"]);

        let located = resolve(&[hidden, visible], &field).unwrap();
        assert_eq!(located.control.handle.as_str(), "c2");
        assert_eq!(located.strategy, LocatorStrategy::Identifier);
    }

    #[test]
    fn text_fields_ignore_selects() {
        let mut input = ControlInfo::new("c2", ControlKind::Input);
        input.label = Some("From Date".to_string());
        let controls = vec![select("c1", Some("From Date"), &["x"]), input];
        let field = FieldSpec::text("From Date", &["from"]);

        let located = resolve(&controls, &field).unwrap();
        assert_eq!(located.control.handle.as_str(), "c2");
    }

    #[test]
    fn option_scan_finds_unlabelled_control() {
        let controls = vec![
            select("c1", None, &["A", "B"]),
            select("c2", None, &["DELAYED", "PENDING"]),
        ];
        let field = FieldSpec::choice("Status", &["zzz"]);

        assert!(resolve(&controls, &field).is_none());
        let located = scan_for_option(&controls, &field, "PENDING").unwrap();
        assert_eq!(located.control.handle.as_str(), "c2");
        assert_eq!(located.strategy, LocatorStrategy::OptionScan);
    }

    #[test]
    fn every_field_with_a_valid_locator_resolves_to_a_visible_element() {
        // Synthetic pages mixing both widget families, each field reachable
        // through exactly one of its candidate locators.
        let fields = [
            FieldSpec::choice("Division Office", &["division"]),
            FieldSpec::choice("Sub Division", &["subdiv"]),
            FieldSpec::choice("Nature", &["nature"]),
            FieldSpec::choice("Status", &["status"]),
        ];
        for (index, field) in fields.iter().enumerate() {
            for variant in 0..4 {
                let handle = format!("c{index}");
                let mut native = select(&handle, None, &["x"]);
                let mut controls = Vec::new();
                match variant {
                    0 => native.label = Some(field.logical_name.clone()),
                    1 => native.id = Some(format!("ddl_{}", fragment_of(field))),
                    2 => native.group_text = Some(field.logical_name.clone()),
                    _ => {
                        native.label = Some(field.logical_name.clone());
                        native.visible = false;
                        native.overlay_trigger = Some(ControlHandle::new("t"));
                        controls.push(overlay("t", &handle));
                    }
                }
                controls.insert(0, native);
                controls.push(select("noise", Some("Other"), &["y"]));

                let located = resolve(&controls, field)
                    .unwrap_or_else(|| panic!("{} variant {variant}", field.logical_name));
                assert!(located.control.visible);
                assert_ne!(located.widget, WidgetKind::Unknown);
            }
        }
    }

    fn fragment_of(field: &FieldSpec) -> String {
        field
            .candidate_locators
            .iter()
            .find_map(|descriptor| match descriptor {
                SelectorDescriptor::IdFragment(fragment) => Some(fragment.clone()),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn attempted_descriptions_include_option_scan() {
        let field = FieldSpec::choice("Status", &["status"]);
        let attempted = attempted_descriptions(&field, Some("DELAYED"));
        assert_eq!(attempted.first().unwrap(), "label 'Status'");
        assert_eq!(attempted.last().unwrap(), "option scan for 'DELAYED'");
    }
}
