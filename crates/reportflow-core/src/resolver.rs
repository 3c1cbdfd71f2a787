//! Date-Format Resolver
//!
//! The host page's date parser is untyped, so the accepted encoding is
//! discovered by trying a fixed candidate list. The loop is an explicit
//! state machine; [`transition`] is pure and the async driver only
//! performs the side effects each state asks for.

use reportflow_browser::ReportPage;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ExtractionError, Result};
use crate::locator::{self, ControlLocator};
use crate::models::{AssignmentMode, DateFormatCandidate, FieldSpec, Readiness};
use crate::setter::ValueSetter;
use crate::submission::{SubmissionSettings, SubmissionVerifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    TryFormat(usize),
    Submit { candidate: usize, retry: bool },
    Check { candidate: usize, retry: bool },
    Success { candidate: usize },
    EmptyAccepted { candidate: usize },
    Failed,
}

impl ResolverState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ResolverState::Success { .. } | ResolverState::EmptyAccepted { .. } | ResolverState::Failed
        )
    }
}

/// Next state. `observed` is consulted only when leaving `Check`.
pub fn transition(
    state: ResolverState,
    observed: Option<Readiness>,
    candidates: usize,
) -> ResolverState {
    match state {
        ResolverState::TryFormat(index) if index >= candidates => ResolverState::Failed,
        ResolverState::TryFormat(index) => ResolverState::Submit {
            candidate: index,
            retry: false,
        },
        ResolverState::Submit { candidate, retry } => ResolverState::Check { candidate, retry },
        ResolverState::Check { candidate, retry } => match observed.unwrap_or(Readiness::NotReady) {
            Readiness::Data => ResolverState::Success { candidate },
            Readiness::Empty => ResolverState::EmptyAccepted { candidate },
            Readiness::NotReady if !retry => ResolverState::Submit {
                candidate,
                retry: true,
            },
            Readiness::NotReady => ResolverState::TryFormat(candidate + 1),
        },
        terminal => terminal,
    }
}

/// What one candidate did, kept for the run report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateTrace {
    pub from_text: String,
    pub to_text: String,
    pub submissions: usize,
    pub verdict: Readiness,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateResolution {
    /// `Data` or `Empty`.
    pub readiness: Readiness,
    pub candidate: DateFormatCandidate,
    pub period_text: Option<String>,
    pub trace: Vec<CandidateTrace>,
}

pub struct DateFormatResolver<'a> {
    page: &'a dyn ReportPage,
    settings: &'a SubmissionSettings,
    from_field: &'a FieldSpec,
    to_field: &'a FieldSpec,
}

impl<'a> DateFormatResolver<'a> {
    pub fn new(
        page: &'a dyn ReportPage,
        settings: &'a SubmissionSettings,
        from_field: &'a FieldSpec,
        to_field: &'a FieldSpec,
    ) -> Self {
        Self {
            page,
            settings,
            from_field,
            to_field,
        }
    }

    /// Drive the state machine until data, an explicit empty result, or
    /// exhaustion of `candidates`.
    pub async fn resolve(&self, candidates: &[DateFormatCandidate]) -> Result<DateResolution> {
        let verifier = SubmissionVerifier::new(self.page, self.settings);
        let mut trace: Vec<CandidateTrace> = Vec::new();
        let mut state = ResolverState::TryFormat(0);
        let mut period_text = None;

        while !state.is_terminal() {
            let mut observed = None;
            match state {
                ResolverState::TryFormat(index) => {
                    if let Some(candidate) = candidates.get(index) {
                        info!(
                            candidate = index,
                            from = %candidate.from_text,
                            to = %candidate.to_text,
                            "Trying date format"
                        );
                        self.fill_dates(candidate).await?;
                        trace.push(CandidateTrace {
                            from_text: candidate.from_text.clone(),
                            to_text: candidate.to_text.clone(),
                            submissions: 0,
                            verdict: Readiness::NotReady,
                        });
                    }
                }
                ResolverState::Submit { retry, .. } => {
                    let settle = if retry {
                        self.settings.retry_settle()
                    } else {
                        self.settings.settle()
                    };
                    verifier.submit(settle).await?;
                    if let Some(last) = trace.last_mut() {
                        last.submissions += 1;
                    }
                }
                ResolverState::Check { .. } => {
                    let signal = verifier.check().await?;
                    let verdict = signal.verdict();
                    if let Some(last) = trace.last_mut() {
                        last.verdict = verdict;
                    }
                    period_text = signal.period_text;
                    observed = Some(verdict);
                }
                _ => {}
            }
            state = transition(state, observed, candidates.len());
        }

        match state {
            ResolverState::Success { candidate } | ResolverState::EmptyAccepted { candidate } => {
                let readiness = if matches!(state, ResolverState::Success { .. }) {
                    Readiness::Data
                } else {
                    Readiness::Empty
                };
                info!(candidate, ?readiness, "Date format accepted");
                Ok(DateResolution {
                    readiness,
                    candidate: candidates[candidate].clone(),
                    period_text,
                    trace,
                })
            }
            _ => {
                warn!(attempts = trace.len(), "Every date format candidate failed");
                Err(ExtractionError::ReadinessTimeout {
                    attempts: trace.len(),
                })
            }
        }
    }

    async fn fill_dates(&self, candidate: &DateFormatCandidate) -> Result<()> {
        for (field, text) in [
            (self.from_field, &candidate.from_text),
            (self.to_field, &candidate.to_text),
        ] {
            let Some(located) = ControlLocator::locate(self.page, field).await? else {
                return Err(ExtractionError::ControlNotFound {
                    field: field.logical_name.clone(),
                    attempted: locator::attempted_descriptions(field, None),
                });
            };
            let outcome =
                ValueSetter::apply(self.page, &located, &AssignmentMode::ExactValue(text.clone()))
                    .await?;
            if !outcome.ok {
                warn!(field = %field.logical_name, wanted = %text, "Date input did not keep the value");
            }
        }
        Ok(())
    }
}
