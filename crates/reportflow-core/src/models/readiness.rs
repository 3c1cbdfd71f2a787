use regex::Regex;
use reportflow_browser::ReportSnapshot;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Judgment of the report area after a submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadinessSignal {
    pub has_data_rows: bool,
    pub has_explicit_empty_marker: bool,
    pub period_text: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Data,
    Empty,
    NotReady,
}

impl ReadinessSignal {
    pub fn from_snapshot(snapshot: &ReportSnapshot) -> Self {
        Self {
            has_data_rows: snapshot.data_rows > 0,
            has_explicit_empty_marker: snapshot.empty_marker.is_some(),
            period_text: snapshot
                .period_text
                .as_ref()
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
        }
    }

    /// A period banner naming both ends of the range, e.g. "26/07/2024 To 16/10/2026".
    pub fn has_well_formed_period(&self) -> bool {
        self.period_text
            .as_deref()
            .map(|text| date_token_pattern().find_iter(text).count() >= 2)
            .unwrap_or(false)
    }

    pub fn verdict(&self) -> Readiness {
        if self.has_data_rows || self.has_well_formed_period() {
            Readiness::Data
        } else if self.has_explicit_empty_marker {
            Readiness::Empty
        } else {
            Readiness::NotReady
        }
    }
}

fn date_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4}|\d{1,2}[ -](jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*[-, ]+\d{4})\b",
        )
        .expect("date token pattern is valid")
    })
}
