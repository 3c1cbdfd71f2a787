use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Opaque reference to an element stamped by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlHandle(pub String);

impl ControlHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    /// A platform `<select>` element.
    Select,
    /// A text-like `<input>` (dates, free text).
    Input,
    /// The visible trigger of a custom dropdown menu.
    OverlayTrigger,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptionInfo {
    pub text: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub disabled: bool,
}

impl OptionInfo {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            value: text.clone(),
            text,
            selected: false,
            disabled: false,
        }
    }
}

/// Snapshot of one interactive control as seen by the driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlInfo {
    pub handle: ControlHandle,
    pub kind: ControlKind,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub visible: bool,
    /// Text of the label bound by `for`, wrapping, aria or DOM adjacency.
    #[serde(default)]
    pub label: Option<String>,
    /// Text of the nearest enclosing form group.
    #[serde(default)]
    pub group_text: Option<String>,
    #[serde(default)]
    pub options: Vec<OptionInfo>,
    #[serde(default)]
    pub multiple: bool,
    /// Rendered text of an overlay trigger (the chosen values as displayed).
    #[serde(default)]
    pub display_text: Option<String>,
    /// Current value of an input.
    #[serde(default)]
    pub value: Option<String>,
    /// Visible overlay trigger fronting this (usually hidden) native control.
    #[serde(default)]
    pub overlay_trigger: Option<ControlHandle>,
    /// Native control backing this overlay trigger.
    #[serde(default)]
    pub backing: Option<ControlHandle>,
}

impl ControlInfo {
    pub fn new(handle: impl Into<String>, kind: ControlKind) -> Self {
        Self {
            handle: ControlHandle::new(handle),
            kind,
            id: None,
            name: None,
            visible: true,
            label: None,
            group_text: None,
            options: Vec::new(),
            multiple: false,
            display_text: None,
            value: None,
            overlay_trigger: None,
            backing: None,
        }
    }

    pub fn option_texts(&self) -> Vec<String> {
        self.options.iter().map(|option| option.text.clone()).collect()
    }

    pub fn selected_texts(&self) -> Vec<String> {
        self.options
            .iter()
            .filter(|option| option.selected)
            .map(|option| option.text.clone())
            .collect()
    }

    /// Whether any option's text matches `wanted` exactly or as a substring.
    pub fn has_option(&self, wanted: &str) -> bool {
        let wanted = normalize_text(wanted);
        self.options.iter().any(|option| {
            let text = normalize_text(&option.text);
            text == wanted || text.contains(&wanted)
        })
    }
}

/// One entry of an open overlay menu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverlayItem {
    pub item: String,
    pub text: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub selected: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
}

/// Selectors used to read the report area after submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportProbe {
    pub table_selector: String,
    #[serde(default)]
    pub empty_markers: Vec<String>,
    #[serde(default)]
    pub period_selector: Option<String>,
    /// Region searched for empty markers; the whole body when unset.
    #[serde(default)]
    pub region_selector: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportSnapshot {
    #[serde(default)]
    pub data_rows: usize,
    #[serde(default)]
    pub empty_marker: Option<String>,
    #[serde(default)]
    pub period_text: Option<String>,
    #[serde(default)]
    pub table_html: Option<String>,
}

/// What clicking the native export control produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportOutcome {
    Download {
        path: PathBuf,
        #[serde(default)]
        suggested_name: Option<String>,
        /// Request URL the download came from.
        #[serde(default)]
        url: Option<String>,
    },
    Popup {
        popup: String,
        #[serde(default)]
        url: Option<String>,
    },
    Nothing,
}

/// A response observed passively while the page was driven.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordedExchange {
    pub index: usize,
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub request_headers: HashMap<String, String>,
    #[serde(default)]
    pub post_data: Option<String>,
    #[serde(default)]
    pub body_size: Option<u64>,
    #[serde(default)]
    pub body_retained: bool,
}

impl RecordedExchange {
    pub fn content_type_contains(&self, needle: &str) -> bool {
        self.content_type
            .as_deref()
            .map(|value| value.to_ascii_lowercase().contains(needle))
            .unwrap_or(false)
    }

    pub fn is_html(&self) -> bool {
        self.content_type_contains("text/html")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
}

/// Collapse whitespace and lowercase for tolerant text comparison.
pub fn normalize_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn default_true() -> bool {
    true
}
