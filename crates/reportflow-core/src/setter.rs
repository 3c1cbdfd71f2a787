//! Value Setter
//!
//! Mutates a located control to carry an assignment and reads it back.
//! One implementation per widget family, chosen by an exhaustive match.

use anyhow::{Result, bail};
use reportflow_browser::{ControlInfo, ControlKind, OverlayItem, ReportPage, normalize_text};
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::locator::{self, ControlLocator};
use crate::models::{ApplyOutcome, AssignmentMode, FilterAssignment, LocatedControl, WidgetKind};

pub struct ValueSetter;

impl ValueSetter {
    /// Set `mode` on `located` and verify by reading the control back.
    ///
    /// A readback mismatch is logged and reported through `ok = false`; it
    /// never aborts, since the submission step is the authoritative check.
    pub async fn apply(
        page: &dyn ReportPage,
        located: &LocatedControl,
        mode: &AssignmentMode,
    ) -> Result<ApplyOutcome> {
        let outcome = match located.widget {
            WidgetKind::Native => apply_native(page, located, mode).await?,
            WidgetKind::OverlayMenu => apply_overlay(page, located, mode).await?,
            WidgetKind::Unknown => bail!(
                "Control {} was located without a widget family",
                located.control.handle
            ),
        };

        if !outcome.ok {
            warn!(
                handle = %located.control.handle,
                wanted = %mode.describe(),
                observed = ?outcome.observed,
                "Readback does not match the intended value"
            );
        }
        Ok(outcome)
    }

    /// Locate, set and record one filter assignment.
    ///
    /// Falls back to scanning every list on the page for the wanted option
    /// when none of the field's locators match.
    pub async fn assign(
        page: &dyn ReportPage,
        assignment: &mut FilterAssignment,
    ) -> std::result::Result<LocatedControl, ExtractionError> {
        let field = &assignment.field;
        let wanted = match &assignment.mode {
            AssignmentMode::ExactValue(value) => Some(value.as_str()),
            AssignmentMode::SelectAll => None,
        };

        let mut located = ControlLocator::locate(page, field).await?;
        if located.is_none()
            && let Some(wanted) = wanted
        {
            located = ControlLocator::scan_for_option(page, field, wanted).await?;
        }
        let Some(located) = located else {
            return Err(ExtractionError::ControlNotFound {
                field: field.logical_name.clone(),
                attempted: locator::attempted_descriptions(field, wanted),
            });
        };

        let outcome = Self::apply(page, &located, &assignment.mode).await?;
        assignment.record(&outcome, located.strategy);
        debug!(
            field = %assignment.field.logical_name,
            strategy = ?located.strategy,
            observed = ?assignment.observed_value,
            "Filter assigned"
        );
        Ok(located)
    }
}

/// Values a control currently shows, as a user would read them.
pub fn observed_values(control: &ControlInfo) -> Vec<String> {
    match control.kind {
        ControlKind::Select => control.selected_texts(),
        ControlKind::Input => control
            .value
            .iter()
            .filter(|value| !value.trim().is_empty())
            .cloned()
            .collect(),
        ControlKind::OverlayTrigger => control
            .display_text
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

/// Read back what the located control carries now.
pub async fn read_back(page: &dyn ReportPage, located: &LocatedControl) -> Result<Vec<String>> {
    let handle = located
        .backing
        .as_ref()
        .map(|backing| &backing.handle)
        .unwrap_or(&located.control.handle);
    let control = page.read_control(handle).await?;
    Ok(observed_values(&control))
}

/// Whether `observed` satisfies `mode` for a control offering `enabled` choices.
pub fn satisfies(mode: &AssignmentMode, observed: &[String], enabled: &[String]) -> bool {
    match mode {
        AssignmentMode::ExactValue(wanted) => {
            let wanted = normalize_text(wanted);
            observed.iter().any(|value| {
                let value = normalize_text(value);
                value == wanted || value.contains(&wanted)
            })
        }
        AssignmentMode::SelectAll => {
            !observed.is_empty()
                && (observed.len() == enabled.len()
                    || (observed.len() == 1 && is_all_option(&observed[0])))
        }
    }
}

async fn apply_native(
    page: &dyn ReportPage,
    located: &LocatedControl,
    mode: &AssignmentMode,
) -> Result<ApplyOutcome> {
    let handle = &located.control.handle;
    let control = page.read_control(handle).await?;

    if control.kind == ControlKind::Input {
        let AssignmentMode::ExactValue(text) = mode else {
            bail!("Cannot select all on text input {}", handle);
        };
        page.fill(handle, text).await?;
        let observed = observed_values(&page.read_control(handle).await?);
        let ok = observed.first().map(String::as_str) == Some(text.as_str());
        return Ok(ApplyOutcome { ok, observed });
    }

    let enabled: Vec<String> = control
        .options
        .iter()
        .filter(|option| !option.disabled)
        .map(|option| option.text.clone())
        .collect();

    let updated = match mode {
        AssignmentMode::ExactValue(wanted) => {
            let texts = control.option_texts();
            let Some(index) = match_text(&texts, wanted) else {
                return Ok(ApplyOutcome {
                    ok: false,
                    observed: control.selected_texts(),
                });
            };
            let value = control.options[index].value.clone();
            page.select_options(handle, &[value], false).await?
        }
        AssignmentMode::SelectAll if control.multiple => {
            page.select_options(handle, &[], true).await?
        }
        AssignmentMode::SelectAll => {
            let Some(all) = control
                .options
                .iter()
                .find(|option| !option.disabled && is_all_option(&option.text))
            else {
                return Ok(ApplyOutcome {
                    ok: false,
                    observed: control.selected_texts(),
                });
            };
            page.select_options(handle, &[all.value.clone()], false).await?
        }
    };

    let observed = updated.selected_texts();
    Ok(ApplyOutcome {
        ok: satisfies(mode, &observed, &enabled),
        observed,
    })
}

async fn apply_overlay(
    page: &dyn ReportPage,
    located: &LocatedControl,
    mode: &AssignmentMode,
) -> Result<ApplyOutcome> {
    page.open_overlay(&located.control.handle).await?;
    let items = usable_items(page.overlay_items().await?);
    let enabled: Vec<String> = items.iter().map(|item| item.text.clone()).collect();
    let multiple = located
        .backing
        .as_ref()
        .map(|backing| backing.multiple)
        .unwrap_or(false);

    let mut matched = true;
    match mode {
        AssignmentMode::ExactValue(wanted) => {
            match match_text(&enabled, wanted) {
                Some(index) => {
                    let target = &items[index];
                    if multiple {
                        for other in items.iter().filter(|item| item.selected) {
                            if other.item != target.item {
                                page.click_overlay_item(&other.item).await?;
                            }
                        }
                    }
                    if !target.selected {
                        page.click_overlay_item(&target.item).await?;
                    }
                }
                None => matched = false,
            }
        }
        AssignmentMode::SelectAll => {
            if page.click_select_all().await? {
                debug!(handle = %located.control.handle, "Used select-all affordance");
            }
            // Affordances that skip items still leave the rest to click.
            let remaining = usable_items(page.overlay_items().await?);
            for item in remaining.iter().filter(|item| !item.selected) {
                page.click_overlay_item(&item.item).await?;
            }
        }
    }
    page.close_overlay().await?;

    let observed = read_back(page, located).await?;
    Ok(ApplyOutcome {
        ok: matched && satisfies(mode, &observed, &enabled),
        observed,
    })
}

fn usable_items(items: Vec<OverlayItem>) -> Vec<OverlayItem> {
    items
        .into_iter()
        .filter(|item| item.visible && !item.disabled && !item.text.trim().is_empty())
        .collect()
}

/// Index of the first exact text match, else the first substring match.
fn match_text(texts: &[String], wanted: &str) -> Option<usize> {
    let wanted = normalize_text(wanted);
    texts
        .iter()
        .position(|text| normalize_text(text) == wanted)
        .or_else(|| {
            texts
                .iter()
                .position(|text| normalize_text(text).contains(&wanted))
        })
}

fn is_all_option(text: &str) -> bool {
    let text = normalize_text(text);
    let text = text.trim_matches(|c: char| !c.is_alphanumeric());
    text == "all" || text.starts_with("all ") || text.starts_with("select all")
}
