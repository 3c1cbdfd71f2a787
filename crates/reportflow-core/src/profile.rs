//! Site profile: everything that ties the engine to one report page.
//!
//! Profiles are TOML documents. [`SiteProfile::builtin`] is a complete
//! example that `reportflow profile` prints for operators to adapt.

use chrono::NaiveDate;
use chrono_tz::Tz;
use reportflow_browser::{ControlKind, ReportProbe};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::acquisition::AcquisitionSettings;
use crate::error::{ExtractionError, Result};
use crate::models::{AssignmentMode, DateEncoding, FieldSpec, SelectorDescriptor, WidgetKind};
use crate::submission::SubmissionSettings;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteProfile {
    pub name: String,
    #[serde(default)]
    pub login: LoginSettings,
    /// Selectors clicked, in order, to reach the report view after login.
    #[serde(default)]
    pub navigation: Vec<String>,
    /// Filters shared by every run, applied in order.
    #[serde(default)]
    pub filters: Vec<StaticFilter>,
    /// Field that distinguishes the business runs.
    pub status_field: FieldSpec,
    pub dates: DateSettings,
    pub submission: SubmissionSettings,
    #[serde(default)]
    pub acquisition: AcquisitionSettings,
    /// Rounds of re-checking assignments the page may have cleared.
    #[serde(default = "default_reapply_rounds")]
    pub reapply_rounds: usize,
    /// Extra attempts for a failed run, each starting over from the report view.
    #[serde(default = "default_run_retries")]
    pub run_retries: usize,
    pub runs: Vec<BusinessRun>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginSettings {
    #[serde(default = "default_username_selector")]
    pub username_selector: String,
    #[serde(default = "default_password_selector")]
    pub password_selector: String,
    #[serde(default = "default_login_submit")]
    pub submit_selector: String,
    /// Operator role chooser shown after login, if any.
    #[serde(default)]
    pub role_field: Option<FieldSpec>,
    #[serde(default)]
    pub role_continue_selector: Option<String>,
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            username_selector: default_username_selector(),
            password_selector: default_password_selector(),
            submit_selector: default_login_submit(),
            role_field: None,
            role_continue_selector: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaticFilter {
    pub field: FieldSpec,
    pub mode: AssignmentMode,
    /// Logical name of the filter whose value repopulates this one.
    #[serde(default)]
    pub depends_on: Option<String>,
    /// URL substring of the request that loads this filter's options.
    #[serde(default)]
    pub response_hint: Option<String>,
    #[serde(default = "default_dependent_timeout_ms")]
    pub dependent_timeout_ms: u64,
}

impl StaticFilter {
    pub fn new(field: FieldSpec, mode: AssignmentMode) -> Self {
        Self {
            field,
            mode,
            depends_on: None,
            response_hint: None,
            dependent_timeout_ms: default_dependent_timeout_ms(),
        }
    }

    pub fn depends_on(mut self, upstream: &str, response_hint: Option<&str>) -> Self {
        self.depends_on = Some(upstream.to_string());
        self.response_hint = response_hint.map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateSettings {
    pub from_field: FieldSpec,
    pub to_field: FieldSpec,
    /// First day of the reporting range; the range ends today.
    pub start: NaiveDate,
    #[serde(default = "default_encodings")]
    pub from_encodings: Vec<DateEncoding>,
    #[serde(default = "default_encodings")]
    pub to_encodings: Vec<DateEncoding>,
    /// IANA zone deciding what "today" is.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl DateSettings {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone.parse::<Tz>().map_err(|_| {
            ExtractionError::InvalidProfile(format!("unknown timezone '{}'", self.timezone))
        })
    }

    pub fn today(&self) -> Result<NaiveDate> {
        Ok(chrono::Utc::now().with_timezone(&self.tz()?).date_naive())
    }
}

/// One business run, e.g. the "DELAYED" report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusinessRun {
    /// Human-readable report name, also the output file stem.
    pub label: String,
    /// Value given to the status field.
    pub status: String,
}

impl SiteProfile {
    pub fn from_toml(text: &str) -> Result<Self> {
        let profile: SiteProfile = toml::from_str(text)
            .map_err(|err| ExtractionError::InvalidProfile(err.to_string()))?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| ExtractionError::InvalidProfile(err.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.runs.is_empty() {
            return Err(ExtractionError::InvalidProfile(
                "at least one run is required".to_string(),
            ));
        }
        if self.dates.from_encodings.is_empty() || self.dates.to_encodings.is_empty() {
            return Err(ExtractionError::InvalidProfile(
                "date encodings must not be empty".to_string(),
            ));
        }
        self.dates.tz()?;
        for (index, filter) in self.filters.iter().enumerate() {
            if let Some(upstream) = &filter.depends_on {
                let earlier = self.filters[..index]
                    .iter()
                    .any(|candidate| &candidate.field.logical_name == upstream);
                if !earlier {
                    return Err(ExtractionError::InvalidProfile(format!(
                        "filter '{}' depends on '{}', which must come earlier",
                        filter.field.logical_name, upstream
                    )));
                }
            }
        }
        Ok(())
    }

    /// Replace the run labels with operator-supplied names, in order.
    pub fn with_run_labels(mut self, labels: &[Option<String>]) -> Self {
        for (run, label) in self.runs.iter_mut().zip(labels) {
            if let Some(label) = label.as_ref().filter(|label| !label.trim().is_empty()) {
                run.label = label.clone();
            }
        }
        self
    }

    /// Profile for the district works-monitoring portal.
    pub fn builtin() -> Self {
        let region = FieldSpec::choice("Division Office", &["division", "ddlDiv"]);
        let sub_region = FieldSpec::choice("Sub Division", &["subdivision", "ddlSubDiv"]);
        let nature = FieldSpec::choice("Nature of Work", &["nature", "ddlNature"])
            .with_widget(WidgetKind::OverlayMenu);
        let mut status = FieldSpec::choice("Status", &["status", "ddlStatus"]);
        status.candidate_locators.push(SelectorDescriptor::Structural {
            kind: ControlKind::Select,
            near_text: Some("Work Status".to_string()),
        });

        Self {
            name: "works-monitoring".to_string(),
            login: LoginSettings {
                role_field: Some(FieldSpec::choice("Role", &["role", "ddlRole"]).optional()),
                role_continue_selector: Some("text=Continue".to_string()),
                ..Default::default()
            },
            navigation: vec!["text=Reports".to_string(), "text=Work Status Report".to_string()],
            filters: vec![
                StaticFilter::new(region, AssignmentMode::ExactValue("R1".to_string())),
                StaticFilter::new(sub_region, AssignmentMode::ExactValue("S1".to_string()))
                    .depends_on("Division Office", Some("SubDivision")),
                StaticFilter::new(nature, AssignmentMode::SelectAll),
            ],
            status_field: status,
            dates: DateSettings {
                from_field: FieldSpec::text("From Date", &["fromdate", "txtFrom"]),
                to_field: FieldSpec::text("To Date", &["todate", "txtTo"]),
                start: NaiveDate::from_ymd_opt(2024, 7, 26).unwrap_or_default(),
                from_encodings: default_encodings(),
                to_encodings: default_encodings(),
                timezone: default_timezone(),
            },
            submission: SubmissionSettings {
                submit_selector: "input[type='submit'][value*='Show'], button:has-text('Show')"
                    .to_string(),
                response_hint: Some(".aspx".to_string()),
                response_timeout_ms: 15_000,
                settle_ms: 3_000,
                retry_settle_ms: 1_500,
                probe: ReportProbe {
                    table_selector: "table[id*='gv'], table.report-grid".to_string(),
                    empty_markers: vec![
                        "No records".to_string(),
                        "No Record Found".to_string(),
                        "No data available".to_string(),
                    ],
                    period_selector: Some("[id*='lblPeriod'], .report-period".to_string()),
                    region_selector: Some("#reportArea, .report-container".to_string()),
                },
            },
            acquisition: AcquisitionSettings {
                export_selector: Some("button:has-text('Download PDF')".to_string()),
                ..Default::default()
            },
            reapply_rounds: default_reapply_rounds(),
            run_retries: default_run_retries(),
            runs: vec![
                BusinessRun {
                    label: "ReportA".to_string(),
                    status: "DELAYED".to_string(),
                },
                BusinessRun {
                    label: "ReportB".to_string(),
                    status: "PENDING".to_string(),
                },
            ],
        }
    }
}

fn default_username_selector() -> String {
    "input[name='username']".to_string()
}

fn default_password_selector() -> String {
    "input[name='password']".to_string()
}

fn default_login_submit() -> String {
    "button[type='submit']".to_string()
}

fn default_dependent_timeout_ms() -> u64 {
    15_000
}

fn default_reapply_rounds() -> usize {
    2
}

fn default_run_retries() -> usize {
    1
}

fn default_encodings() -> Vec<DateEncoding> {
    DateEncoding::DEFAULT_ORDER.to_vec()
}

fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profile_round_trips_through_toml() {
        let profile = SiteProfile::builtin();
        let text = profile.to_toml().unwrap();
        let parsed = SiteProfile::from_toml(&text).unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn minimal_profile_uses_defaults() {
        let profile = SiteProfile::from_toml(
            r##"
name = "minimal"

[status_field]
logical_name = "Status"
candidate_locators = [{ label = "Status" }]

[dates]
start = "2024-07-26"
from_field = { logical_name = "From", role = "text", candidate_locators = [{ label = "From" }] }
to_field = { logical_name = "To", role = "text", candidate_locators = [{ label = "To" }] }

[submission]
submit_selector = "#btnShow"
probe = { table_selector = "#gvReport" }

[[runs]]
label = "Delayed"
status = "DELAYED"
"##,
        )
        .unwrap();

        assert_eq!(profile.acquisition.min_document_bytes, 10 * 1024);
        assert_eq!(profile.dates.timezone, "Asia/Kolkata");
        assert_eq!(profile.dates.from_encodings.len(), 4);
        assert_eq!(profile.reapply_rounds, 2);
        assert_eq!(profile.run_retries, 1);
        assert_eq!(profile.login.username_selector, "input[name='username']");
    }

    #[test]
    fn dependency_must_refer_to_an_earlier_filter() {
        let mut profile = SiteProfile::builtin();
        profile.filters.swap(0, 1);
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("must come earlier"));
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let mut profile = SiteProfile::builtin();
        profile.dates.timezone = "Mars/Olympus".to_string();
        assert_eq!(profile.validate().unwrap_err().kind(), "invalid_profile");
    }

    #[test]
    fn run_labels_can_be_overridden() {
        let profile = SiteProfile::builtin()
            .with_run_labels(&[Some("Delayed Works".to_string()), Some("  ".to_string())]);
        assert_eq!(profile.runs[0].label, "Delayed Works");
        assert_eq!(profile.runs[1].label, "ReportB");
    }
}
