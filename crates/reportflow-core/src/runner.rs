//! Run orchestration
//!
//! One run applies every filter, resolves the date encoding against the
//! readiness verifier and acquires the document. Runs share one session
//! and execute strictly one after another; a failed run never stops the
//! next one.

use chrono::NaiveDate;
use reportflow_browser::{ControlHandle, ControlInfo, ReportPage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::acquisition::{AcquisitionCascade, AcquisitionContext, SummaryField};
use crate::channel::DeliveryResult;
use crate::error::{ExtractionError, Result};
use crate::locator::ControlLocator;
use crate::models::{
    AcquisitionAttempt, AcquisitionStrategy, AssignmentMode, FilterAssignment, LocatedControl,
    LocatorStrategy, Readiness, build_candidates,
};
use crate::profile::{BusinessRun, SiteProfile, StaticFilter};
use crate::resolver::{CandidateTrace, DateFormatResolver};
use crate::session::SessionBootstrap;
use crate::setter::{ValueSetter, observed_values, satisfies};
use crate::sync::DependentFieldSync;

/// A filter as it ended up on the page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignmentRecord {
    pub field: String,
    pub wanted: String,
    pub applied: bool,
    pub observed_value: Option<String>,
    pub strategy: Option<LocatorStrategy>,
}

impl From<&FilterAssignment> for AssignmentRecord {
    fn from(assignment: &FilterAssignment) -> Self {
        Self {
            field: assignment.field.logical_name.clone(),
            wanted: assignment.mode.describe(),
            applied: assignment.applied,
            observed_value: assignment.observed_value.clone(),
            strategy: assignment.strategy,
        }
    }
}

/// A field the locator could not resolve, with what it tried.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldFailure {
    pub field: String,
    pub required: bool,
    pub attempted: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunReport {
    pub label: String,
    pub status: String,
    pub ok: bool,
    pub assignments: Vec<AssignmentRecord>,
    pub field_failures: Vec<FieldFailure>,
    pub date_trace: Vec<CandidateTrace>,
    pub readiness: Option<Readiness>,
    pub acquisition: Vec<AcquisitionAttempt>,
    pub strategy: Option<AcquisitionStrategy>,
    pub saved_path: Option<PathBuf>,
    pub size: u64,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    /// How many times the run was started.
    pub attempts: usize,
}

impl RunReport {
    fn new(run: &BusinessRun) -> Self {
        Self {
            label: run.label.clone(),
            status: run.status.clone(),
            attempts: 1,
            ..Default::default()
        }
    }

    fn fail(&mut self, err: &ExtractionError) {
        self.ok = false;
        self.error = Some(err.to_string());
        self.error_kind = Some(err.kind().to_string());
        match err {
            ExtractionError::ControlNotFound { field, attempted } => {
                if !self.field_failures.iter().any(|failure| &failure.field == field) {
                    self.field_failures.push(FieldFailure {
                        field: field.clone(),
                        required: true,
                        attempted: attempted.clone(),
                    });
                }
            }
            ExtractionError::AcquisitionExhausted { attempts } => {
                self.acquisition = attempts.clone();
            }
            _ => {}
        }
    }
}

/// Every run of one invocation plus delivery outcomes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionReport {
    pub runs: Vec<RunReport>,
    #[serde(default)]
    pub delivery: Vec<DeliveryResult>,
}

impl ExtractionReport {
    pub fn all_ok(&self) -> bool {
        self.runs.iter().all(|run| run.ok)
    }

    pub fn saved_paths(&self) -> Vec<PathBuf> {
        self.runs
            .iter()
            .filter_map(|run| run.saved_path.clone())
            .collect()
    }
}

/// `<label> <YYYY-MM-DD>.pdf` inside `output_dir`.
pub fn output_path(output_dir: &Path, label: &str, day: NaiveDate) -> PathBuf {
    let stem: String = label
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '-' } else { c })
        .collect();
    output_dir.join(format!("{} {}.pdf", stem.trim(), day.format("%Y-%m-%d")))
}

pub struct ReportRunner<'a> {
    page: &'a dyn ReportPage,
    profile: &'a SiteProfile,
    output_dir: PathBuf,
    cascade: AcquisitionCascade,
}

impl<'a> ReportRunner<'a> {
    pub fn new(page: &'a dyn ReportPage, profile: &'a SiteProfile, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            page,
            profile,
            output_dir: output_dir.into(),
            cascade: AcquisitionCascade::standard(),
        }
    }

    pub fn with_cascade(mut self, cascade: AcquisitionCascade) -> Self {
        self.cascade = cascade;
        self
    }

    /// Execute every configured run in order, re-opening the report view first.
    ///
    /// A failed run starts over from the report view, up to `run_retries`
    /// more times.
    pub async fn run_all(&self) -> Vec<RunReport> {
        let session = SessionBootstrap::new(self.page, self.profile);
        let mut reports = Vec::with_capacity(self.profile.runs.len());
        for run in &self.profile.runs {
            let mut attempt = 0;
            let report = loop {
                attempt += 1;
                let mut report = match session.open_report_view().await {
                    Ok(()) => self.run(run).await,
                    Err(err) => {
                        error!(run = %run.label, error = %err, "Could not open the report view");
                        let mut report = RunReport::new(run);
                        report.fail(&err);
                        report
                    }
                };
                report.attempts = attempt;
                if report.ok || attempt > self.profile.run_retries {
                    break report;
                }
                warn!(run = %run.label, attempt, "Run failed; starting over");
            };
            reports.push(report);
        }
        reports
    }

    /// Execute one run; failures are captured in the report, never returned.
    pub async fn run(&self, run: &BusinessRun) -> RunReport {
        let span = info_span!("run", run = %run.label, status = %run.status);
        async {
            let mut report = RunReport::new(run);
            match self.execute(run, &mut report).await {
                Ok(()) => {
                    report.ok = true;
                    info!(path = ?report.saved_path, strategy = ?report.strategy, "Run complete");
                }
                Err(err) => {
                    error!(kind = err.kind(), error = %err, "Run failed");
                    report.fail(&err);
                }
            }
            report
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, run: &BusinessRun, report: &mut RunReport) -> Result<()> {
        // Traffic recorded before this point belongs to earlier runs.
        let exchange_floor = self.page.recorded_exchanges().await?.len();
        let mut filters: Vec<StaticFilter> = self.profile.filters.clone();
        filters.push(StaticFilter::new(
            self.profile.status_field.clone(),
            AssignmentMode::ExactValue(run.status.clone()),
        ));

        let applied = self.apply_filters(&filters, report).await?;
        self.reverify(&filters, applied.as_slice(), report).await?;

        let dates = &self.profile.dates;
        let today = dates.today()?;
        let candidates =
            build_candidates(dates.start, today, &dates.from_encodings, &dates.to_encodings);
        let resolution = DateFormatResolver::new(
            self.page,
            &self.profile.submission,
            &dates.from_field,
            &dates.to_field,
        )
        .resolve(&candidates)
        .await?;
        report.readiness = Some(resolution.readiness);
        report.date_trace = resolution.trace.clone();

        let mut ctx = AcquisitionContext::new(
            self.page,
            &self.profile.acquisition,
            &self.profile.submission.probe,
        )?;
        ctx.title = run.label.clone();
        ctx.exchange_floor = exchange_floor;
        ctx.period = resolution.period_text.clone().unwrap_or_else(|| {
            format!(
                "{} To {}",
                resolution.candidate.from_text, resolution.candidate.to_text
            )
        });
        ctx.readiness = resolution.readiness;
        ctx.summary = applied
            .iter()
            .filter_map(|(index, located)| {
                located.as_ref().map(|located| SummaryField {
                    label: filters[*index].field.logical_name.clone(),
                    handle: list_handle(located),
                })
            })
            .collect();

        let save_path = output_path(&self.output_dir, &run.label, today);
        let outcome = self.cascade.acquire(&mut ctx, &save_path).await?;
        report.acquisition = outcome.attempts;
        report.strategy = outcome.strategy;
        report.saved_path = outcome.path;
        report.size = outcome.size;
        Ok(())
    }

    /// Apply filters in order, waiting on dependent fields after their upstream.
    ///
    /// Returns `(filter index, located control)` for every filter; optional
    /// filters that could not be located carry `None`.
    async fn apply_filters(
        &self,
        filters: &[StaticFilter],
        report: &mut RunReport,
    ) -> Result<Vec<(usize, Option<LocatedControl>)>> {
        let mut applied = Vec::with_capacity(filters.len());
        let mut pending_syncs: HashMap<usize, DependentFieldSync<'_>> = HashMap::new();

        for (index, filter) in filters.iter().enumerate() {
            // Baselines must be taken before the upstream value changes.
            for (dependent_index, dependent) in filters.iter().enumerate().skip(index + 1) {
                if dependent.depends_on.as_deref() != Some(filter.field.logical_name.as_str()) {
                    continue;
                }
                if let Some(located) = ControlLocator::locate(self.page, &dependent.field).await?
                {
                    let sync = DependentFieldSync::observe(self.page, &located).await?;
                    pending_syncs.insert(dependent_index, sync);
                }
            }

            let mut assignment = FilterAssignment::new(filter.field.clone(), filter.mode.clone());
            let located = match ValueSetter::assign(self.page, &mut assignment).await {
                Ok(located) => Some(located),
                Err(ExtractionError::ControlNotFound { field, attempted })
                    if !filter.field.required =>
                {
                    warn!(field = %field, ?attempted, "Optional filter not found; skipping");
                    report.field_failures.push(FieldFailure {
                        field,
                        required: false,
                        attempted,
                    });
                    None
                }
                Err(err) => {
                    report.assignments.push(AssignmentRecord::from(&assignment));
                    return Err(err);
                }
            };
            report.assignments.push(AssignmentRecord::from(&assignment));
            applied.push((index, located));

            for (dependent_index, dependent) in filters.iter().enumerate().skip(index + 1) {
                let Some(sync) = pending_syncs.remove(&dependent_index) else {
                    continue;
                };
                let expected = match &dependent.mode {
                    AssignmentMode::ExactValue(value) => value.as_str(),
                    AssignmentMode::SelectAll => "",
                };
                let refreshed = sync
                    .wait_for_dependent_option(
                        expected,
                        dependent.response_hint.as_deref(),
                        Duration::from_millis(dependent.dependent_timeout_ms),
                    )
                    .await;
                if !refreshed {
                    warn!(
                        field = %dependent.field.logical_name,
                        upstream = %filter.field.logical_name,
                        "Dependent field did not refresh; applying anyway"
                    );
                }
            }
        }
        Ok(applied)
    }

    /// Re-read every assignment and re-apply the ones the page cleared.
    ///
    /// A required filter still lost after the last round fails the run.
    async fn reverify(
        &self,
        filters: &[StaticFilter],
        applied: &[(usize, Option<LocatedControl>)],
        report: &mut RunReport,
    ) -> Result<()> {
        let mut round = 0;
        loop {
            let lost = self.lost_assignments(filters, applied).await?;
            if lost.is_empty() {
                return Ok(());
            }
            if round == self.profile.reapply_rounds {
                for index in lost {
                    let filter = &filters[index];
                    if filter.field.required {
                        return Err(ExtractionError::FilterNotApplied {
                            field: filter.field.logical_name.clone(),
                            wanted: filter.mode.describe(),
                        });
                    }
                    warn!(field = %filter.field.logical_name, "Optional filter did not hold");
                }
                return Ok(());
            }

            for index in lost {
                let filter = &filters[index];
                warn!(field = %filter.field.logical_name, round, "Assignment lost; re-applying");
                let mut assignment =
                    FilterAssignment::new(filter.field.clone(), filter.mode.clone());
                ValueSetter::assign(self.page, &mut assignment).await?;
                if let Some(record) = report
                    .assignments
                    .iter_mut()
                    .find(|record| record.field == filter.field.logical_name)
                {
                    *record = AssignmentRecord::from(&assignment);
                }
            }
            round += 1;
        }
    }

    /// Indices of filters whose value is no longer on the page.
    ///
    /// Controls are located afresh because a postback may have replaced them,
    /// the same way the setter found them; the originally located control is
    /// read back when neither lookup matches.
    async fn lost_assignments(
        &self,
        filters: &[StaticFilter],
        applied: &[(usize, Option<LocatedControl>)],
    ) -> Result<Vec<usize>> {
        let mut lost = Vec::new();
        for (index, located) in applied {
            let Some(located) = located else {
                continue;
            };
            let filter = &filters[*index];
            let Some(control) = self.current_control(filter, located).await? else {
                lost.push(*index);
                continue;
            };
            let observed = observed_values(&control);
            let enabled: Vec<String> = control
                .options
                .iter()
                .filter(|option| !option.disabled)
                .map(|option| option.text.clone())
                .collect();
            let intact = if enabled.is_empty() && filter.mode == AssignmentMode::SelectAll {
                !observed.is_empty()
            } else {
                satisfies(&filter.mode, &observed, &enabled)
            };
            if !intact {
                lost.push(*index);
            }
        }
        Ok(lost)
    }

    /// The list or input carrying `filter`'s value as the page shows it now.
    async fn current_control(
        &self,
        filter: &StaticFilter,
        located: &LocatedControl,
    ) -> Result<Option<ControlInfo>> {
        let mut current = ControlLocator::locate(self.page, &filter.field).await?;
        if current.is_none()
            && let AssignmentMode::ExactValue(wanted) = &filter.mode
        {
            current = ControlLocator::scan_for_option(self.page, &filter.field, wanted).await?;
        }
        if let Some(current) = current {
            return Ok(Some(current.backing.unwrap_or(current.control)));
        }
        match self.page.read_control(&list_handle(located)).await {
            Ok(control) => Ok(Some(control)),
            Err(err) => {
                debug!(field = %filter.field.logical_name, error = %err, "Located control is gone");
                Ok(None)
            }
        }
    }
}

/// Handle of the element carrying the value: the backing list for overlays.
fn list_handle(located: &LocatedControl) -> ControlHandle {
    located
        .backing
        .as_ref()
        .map(|backing| backing.handle.clone())
        .unwrap_or_else(|| located.control.handle.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::AcquisitionSettings;
    use crate::models::FieldSpec;
    use crate::submission::test_settings;
    use crate::models::DateEncoding;
    use crate::profile::DateSettings;
    use crate::testing::{Dependency, ExportFixture, FixturePage, ReportFixture, ReportOutcome};
    use reportflow_browser::RecordedExchange;

    fn profile() -> SiteProfile {
        let mut sub_division = StaticFilter::new(
            FieldSpec::choice("Sub Division", &["subdivision"]),
            AssignmentMode::ExactValue("S1".to_string()),
        )
        .depends_on("Division Office", Some("GetSubDivision"));
        sub_division.dependent_timeout_ms = 1_000;

        SiteProfile {
            name: "fixture".to_string(),
            login: Default::default(),
            navigation: vec!["text=Reports".to_string()],
            filters: vec![
                StaticFilter::new(
                    FieldSpec::choice("Division Office", &["division"]),
                    AssignmentMode::ExactValue("R1".to_string()),
                ),
                sub_division,
            ],
            status_field: FieldSpec::choice("Status", &["status"]),
            dates: DateSettings {
                from_field: FieldSpec::text("From Date", &["from"]),
                to_field: FieldSpec::text("To Date", &["to"]),
                start: NaiveDate::from_ymd_opt(2024, 7, 26).unwrap(),
                from_encodings: vec![DateEncoding::DayMonthYearSlash],
                to_encodings: vec![DateEncoding::DayMonthYearSlash],
                timezone: "Asia/Kolkata".to_string(),
            },
            submission: test_settings(),
            acquisition: AcquisitionSettings {
                export_selector: Some("#btnPdf".to_string()),
                min_document_bytes: 256,
                ..Default::default()
            },
            reapply_rounds: 2,
            run_retries: 0,
            runs: vec![
                BusinessRun {
                    label: "Delayed".to_string(),
                    status: "DELAYED".to_string(),
                },
                BusinessRun {
                    label: "Pending".to_string(),
                    status: "PENDING".to_string(),
                },
            ],
        }
    }

    fn page(accepted_from: &str) -> FixturePage {
        FixturePage::new()
            .with_native("r", "Division Office", &["R1", "R2"])
            .with_native("s", "Sub Division", &[])
            .with_native("st", "Status", &["DELAYED", "PENDING"])
            .with_input("from", "From Date")
            .with_input("to", "To Date")
            .with_dependency(Dependency {
                upstream: ControlHandle::new("r"),
                upstream_text: "R1".to_string(),
                downstream: ControlHandle::new("s"),
                options: vec!["S1".to_string(), "S2".to_string()],
                delay: Duration::from_millis(80),
                response_url: None,
            })
            .with_report(ReportFixture {
                submit_selector: "#btnShow".to_string(),
                from_input: ControlHandle::new("from"),
                accepted_from: accepted_from.to_string(),
                outcome: ReportOutcome::Rows {
                    rows: 2,
                    table_html: "<table><tr><td>Work 1</td></tr><tr><td>Work 2</td></tr></table>"
                        .to_string(),
                    period_text: None,
                },
                slow_submissions: 0,
                response_url: "/ReportView.aspx".to_string(),
            })
            .with_export(ExportFixture::Download(vec![0; 64]))
    }

    #[test]
    fn output_path_uses_label_and_day() {
        let path = output_path(
            Path::new("/out"),
            "Delayed/Works",
            NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
        );
        assert_eq!(path, PathBuf::from("/out/Delayed-Works 2026-10-16.pdf"));
    }

    #[tokio::test]
    async fn run_waits_for_dependent_field_and_renders() {
        let temp = tempfile::tempdir().unwrap();
        let profile = profile();
        let page = page("26/07/2024");
        let runner = ReportRunner::new(&page, &profile, temp.path());

        let report = runner.run(&profile.runs[0]).await;
        assert!(report.ok, "{:?}", report.error);
        assert_eq!(report.assignments.len(), 3);
        assert!(report.assignments.iter().all(|record| record.applied));
        assert_eq!(report.readiness, Some(Readiness::Data));
        assert_eq!(report.strategy, Some(AcquisitionStrategy::DomRender));
        assert_eq!(report.acquisition[0].strategy, AcquisitionStrategy::DirectDownload);
        assert!(!report.acquisition[0].valid);
        assert!(report.saved_path.unwrap().exists());
    }

    #[tokio::test]
    async fn cleared_assignment_is_reapplied() {
        let temp = tempfile::tempdir().unwrap();
        let profile = profile();
        let page = page("26/07/2024").clear_once("st");
        let runner = ReportRunner::new(&page, &profile, temp.path());

        let report = runner.run(&profile.runs[0]).await;
        assert!(report.ok, "{:?}", report.error);
        assert_eq!(
            page.control("st").unwrap().selected_texts(),
            vec!["DELAYED".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_run_does_not_stop_the_next() {
        let temp = tempfile::tempdir().unwrap();
        let mut profile = profile();
        profile.runs[0].status = "CLOSED".to_string();
        let page = page("26/07/2024");
        let runner = ReportRunner::new(&page, &profile, temp.path());

        let reports = runner.run_all().await;
        assert_eq!(reports.len(), 2);
        assert!(!reports[0].ok);
        assert_eq!(reports[0].error_kind.as_deref(), Some("filter_not_applied"));
        assert!(reports[1].ok, "{:?}", reports[1].error);
        assert_eq!(
            page.actions()
                .iter()
                .filter(|action| action.as_str() == "click text=Reports")
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn failed_run_starts_over_once() {
        let temp = tempfile::tempdir().unwrap();
        let mut profile = profile();
        profile.run_retries = 1;
        let page = page("26/07/2024").fail_click_once("#btnShow");
        let runner = ReportRunner::new(&page, &profile, temp.path());

        let reports = runner.run_all().await;
        assert!(reports[0].ok, "{:?}", reports[0].error);
        assert_eq!(reports[0].attempts, 2);
        assert!(reports[1].ok, "{:?}", reports[1].error);
        assert_eq!(reports[1].attempts, 1);
        assert_eq!(
            page.actions()
                .iter()
                .filter(|action| action.as_str() == "click text=Reports")
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let temp = tempfile::tempdir().unwrap();
        let mut profile = profile();
        profile.runs[0].status = "CLOSED".to_string();
        profile.run_retries = 1;
        let page = page("26/07/2024");
        let runner = ReportRunner::new(&page, &profile, temp.path());

        let reports = runner.run_all().await;
        assert!(!reports[0].ok);
        assert_eq!(reports[0].attempts, 2);
        assert!(reports[1].ok, "{:?}", reports[1].error);
    }

    #[tokio::test]
    async fn status_list_found_by_option_scan_holds() {
        let temp = tempfile::tempdir().unwrap();
        let mut profile = profile();
        profile.status_field = FieldSpec::choice("Work Status", &["workstatus"]);
        let page = page("26/07/2024").clear_once("st");
        let runner = ReportRunner::new(&page, &profile, temp.path());

        let report = runner.run(&profile.runs[0]).await;
        assert!(report.ok, "{:?}", report.error);
        let status = report.assignments.last().unwrap();
        assert_eq!(status.strategy, Some(LocatorStrategy::OptionScan));
        assert_eq!(status.observed_value.as_deref(), Some("DELAYED"));
        assert_eq!(
            page.control("st").unwrap().selected_texts(),
            vec!["DELAYED".to_string()]
        );
    }

    #[tokio::test]
    async fn replay_uses_only_traffic_of_the_current_run() {
        let temp = tempfile::tempdir().unwrap();
        let profile = profile();
        let mut delayed_body = b"%PDF-1.4\n".to_vec();
        delayed_body.resize(40_000, b'd');
        let exchange = RecordedExchange {
            index: 0,
            url: "http://127.0.0.1:9/ExportReport.aspx?format=pdf".to_string(),
            method: "GET".to_string(),
            status: 200,
            content_type: Some("application/pdf".to_string()),
            request_headers: HashMap::new(),
            post_data: None,
            body_size: Some(delayed_body.len() as u64),
            body_retained: true,
        };
        let page = page("26/07/2024")
            .with_export(ExportFixture::Nothing)
            .with_export_traffic(exchange, Some(delayed_body.clone()));
        let runner = ReportRunner::new(&page, &profile, temp.path());

        let reports = runner.run_all().await;
        assert_eq!(reports[0].strategy, Some(AcquisitionStrategy::NetworkReplay));
        assert_eq!(
            std::fs::read(reports[0].saved_path.as_ref().unwrap()).unwrap(),
            delayed_body
        );
        assert!(reports[1].ok, "{:?}", reports[1].error);
        assert_eq!(reports[1].strategy, Some(AcquisitionStrategy::DomRender));
        assert_ne!(reports[1].size, delayed_body.len() as u64);
    }

    #[tokio::test]
    async fn missing_required_filter_is_reported_with_attempts() {
        let temp = tempfile::tempdir().unwrap();
        let mut profile = profile();
        profile.filters.push(StaticFilter::new(
            FieldSpec::choice("Scheme", &["scheme"]),
            AssignmentMode::ExactValue("PMGSY".to_string()),
        ));
        let page = page("26/07/2024");
        let runner = ReportRunner::new(&page, &profile, temp.path());

        let report = runner.run(&profile.runs[0]).await;
        assert!(!report.ok);
        assert_eq!(report.error_kind.as_deref(), Some("control_not_found"));
        assert_eq!(report.field_failures[0].field, "Scheme");
        assert!(report.field_failures[0].required);
        assert!(!report.field_failures[0].attempted.is_empty());
    }

    #[tokio::test]
    async fn missing_optional_filter_is_skipped() {
        let temp = tempfile::tempdir().unwrap();
        let mut profile = profile();
        profile.filters.push(StaticFilter::new(
            FieldSpec::choice("Scheme", &["scheme"]).optional(),
            AssignmentMode::SelectAll,
        ));
        let page = page("26/07/2024");
        let runner = ReportRunner::new(&page, &profile, temp.path());

        let report = runner.run(&profile.runs[0]).await;
        assert!(report.ok, "{:?}", report.error);
        assert_eq!(report.field_failures.len(), 1);
        assert!(!report.field_failures[0].required);
    }

    #[tokio::test]
    async fn custom_cascade_replaces_the_standard_order() {
        let temp = tempfile::tempdir().unwrap();
        let profile = profile();
        let page = page("26/07/2024");
        let runner = ReportRunner::new(&page, &profile, temp.path()).with_cascade(
            AcquisitionCascade::with_steps(vec![Box::new(
                crate::acquisition::ScreenshotRender,
            )]),
        );

        let report = runner.run(&profile.runs[0]).await;
        assert!(report.ok, "{:?}", report.error);
        assert_eq!(report.strategy, Some(AcquisitionStrategy::ScreenshotRender));
        assert_eq!(report.acquisition.len(), 1);
        let saved = std::fs::read(report.saved_path.unwrap()).unwrap();
        assert!(saved.starts_with(b"%PDF"));
    }

    #[test]
    fn extraction_report_aggregates() {
        let report = ExtractionReport {
            runs: vec![
                RunReport {
                    ok: true,
                    saved_path: Some(PathBuf::from("/out/a.pdf")),
                    ..Default::default()
                },
                RunReport::default(),
            ],
            delivery: Vec::new(),
        };
        assert!(!report.all_ok());
        assert_eq!(report.saved_paths(), vec![PathBuf::from("/out/a.pdf")]);
    }
}
