use reportflow_browser::{ControlInfo, ControlKind};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::ExtractionError;

/// Widget family a field is rendered with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    /// Platform list control with its own option list.
    Native,
    /// Custom dropdown popped over the page, usually backed by a hidden native control.
    OverlayMenu,
    /// Decided from the resolved element.
    #[default]
    Unknown,
}

/// What kind of value a field takes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    #[default]
    Choice,
    Text,
}

impl FieldRole {
    pub fn accepts(self, kind: ControlKind) -> bool {
        match self {
            FieldRole::Choice => matches!(kind, ControlKind::Select | ControlKind::OverlayTrigger),
            FieldRole::Text => kind == ControlKind::Input,
        }
    }
}

/// One way of finding a field's control.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectorDescriptor {
    /// Control associated with a label bearing this text.
    Label(String),
    /// Control whose element id contains this fragment.
    IdFragment(String),
    /// Control whose `name` attribute contains this fragment.
    NameFragment(String),
    /// Any control of `kind` whose enclosing group mentions `near_text`.
    Structural {
        kind: ControlKind,
        #[serde(default)]
        near_text: Option<String>,
    },
}

impl SelectorDescriptor {
    pub fn strategy(&self) -> LocatorStrategy {
        match self {
            SelectorDescriptor::Label(_) => LocatorStrategy::Label,
            SelectorDescriptor::IdFragment(_) | SelectorDescriptor::NameFragment(_) => {
                LocatorStrategy::Identifier
            }
            SelectorDescriptor::Structural { .. } => LocatorStrategy::Structural,
        }
    }
}

impl fmt::Display for SelectorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorDescriptor::Label(text) => write!(f, "label '{}'", text),
            SelectorDescriptor::IdFragment(text) => write!(f, "id~'{}'", text),
            SelectorDescriptor::NameFragment(text) => write!(f, "name~'{}'", text),
            SelectorDescriptor::Structural { kind, near_text } => match near_text {
                Some(text) => write!(f, "any {:?} near '{}'", kind, text),
                None => write!(f, "any {:?}", kind),
            },
        }
    }
}

/// How a control was found, reported back to operators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    Label,
    Identifier,
    Structural,
    /// Last-resort scan of every control for the wanted option text.
    OptionScan,
}

/// A logical form field and the ordered ways of finding it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldSpec {
    pub logical_name: String,
    #[serde(deserialize_with = "non_empty_locators")]
    pub candidate_locators: Vec<SelectorDescriptor>,
    #[serde(default)]
    pub widget_kind: WidgetKind,
    #[serde(default)]
    pub role: FieldRole,
    /// Optional fields that cannot be located are reported but do not fail the run.
    #[serde(default = "default_required")]
    pub required: bool,
}

impl FieldSpec {
    pub fn new(
        logical_name: impl Into<String>,
        candidate_locators: Vec<SelectorDescriptor>,
    ) -> Result<Self, ExtractionError> {
        let logical_name = logical_name.into();
        if candidate_locators.is_empty() {
            return Err(ExtractionError::InvalidProfile(format!(
                "field '{}' has no candidate locators",
                logical_name
            )));
        }
        Ok(Self {
            logical_name,
            candidate_locators,
            widget_kind: WidgetKind::Unknown,
            role: FieldRole::Choice,
            required: true,
        })
    }

    /// A choice field located by label, then id/name fragments, then structure.
    pub fn choice(logical_name: impl Into<String>, fragments: &[&str]) -> Self {
        let logical_name = logical_name.into();
        let mut candidate_locators = vec![SelectorDescriptor::Label(logical_name.clone())];
        for fragment in fragments {
            candidate_locators.push(SelectorDescriptor::IdFragment(fragment.to_string()));
            candidate_locators.push(SelectorDescriptor::NameFragment(fragment.to_string()));
        }
        candidate_locators.push(SelectorDescriptor::Structural {
            kind: ControlKind::Select,
            near_text: Some(logical_name.clone()),
        });
        candidate_locators.push(SelectorDescriptor::Structural {
            kind: ControlKind::OverlayTrigger,
            near_text: Some(logical_name.clone()),
        });
        Self {
            logical_name,
            candidate_locators,
            widget_kind: WidgetKind::Unknown,
            role: FieldRole::Choice,
            required: true,
        }
    }

    /// A text input located by label, then id/name fragments, then structure.
    pub fn text(logical_name: impl Into<String>, fragments: &[&str]) -> Self {
        let mut spec = Self::choice(logical_name, fragments);
        spec.role = FieldRole::Text;
        spec.candidate_locators.retain(|descriptor| {
            !matches!(descriptor, SelectorDescriptor::Structural { .. })
        });
        spec.candidate_locators.push(SelectorDescriptor::Structural {
            kind: ControlKind::Input,
            near_text: Some(spec.logical_name.clone()),
        });
        spec
    }

    pub fn with_widget(mut self, widget_kind: WidgetKind) -> Self {
        self.widget_kind = widget_kind;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// A control the locator committed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedControl {
    pub control: ControlInfo,
    /// Resolved family; never [`WidgetKind::Unknown`].
    pub widget: WidgetKind,
    pub strategy: LocatorStrategy,
    /// Native control behind an overlay, when known.
    pub backing: Option<ControlInfo>,
}

fn default_required() -> bool {
    true
}

fn non_empty_locators<'de, D>(deserializer: D) -> Result<Vec<SelectorDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    let locators = Vec::<SelectorDescriptor>::deserialize(deserializer)?;
    if locators.is_empty() {
        return Err(serde::de::Error::custom(
            "candidate_locators must not be empty",
        ));
    }
    Ok(locators)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_orders_label_before_fragments_and_structure() {
        let spec = FieldSpec::choice("Division Office", &["division"]);
        assert_eq!(
            spec.candidate_locators.first(),
            Some(&SelectorDescriptor::Label("Division Office".to_string()))
        );
        let strategies: Vec<_> = spec
            .candidate_locators
            .iter()
            .map(SelectorDescriptor::strategy)
            .collect();
        assert_eq!(
            strategies,
            vec![
                LocatorStrategy::Label,
                LocatorStrategy::Identifier,
                LocatorStrategy::Identifier,
                LocatorStrategy::Structural,
                LocatorStrategy::Structural,
            ]
        );
    }

    #[test]
    fn text_fields_search_inputs_structurally() {
        let spec = FieldSpec::text("From Date", &["from"]);
        assert_eq!(spec.role, FieldRole::Text);
        assert_eq!(
            spec.candidate_locators.last(),
            Some(&SelectorDescriptor::Structural {
                kind: ControlKind::Input,
                near_text: Some("From Date".to_string()),
            })
        );
    }

    #[test]
    fn new_rejects_empty_locators() {
        assert!(FieldSpec::new("Status", Vec::new()).is_err());
    }

    #[test]
    fn deserialize_rejects_empty_locators() {
        let err = toml::from_str::<FieldSpec>(
            "logical_name = \"Status\"\ncandidate_locators = []\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn deserialize_reads_externally_tagged_locators() {
        let spec: FieldSpec = toml::from_str(
            r#"
logical_name = "Nature"
widget_kind = "overlay_menu"
candidate_locators = [
    { label = "Nature" },
    { id_fragment = "nature" },
    { structural = { kind = "select" } },
]
"#,
        )
        .unwrap();
        assert_eq!(spec.widget_kind, WidgetKind::OverlayMenu);
        assert!(spec.required);
        assert_eq!(spec.candidate_locators.len(), 3);
    }
}
