use serde::{Deserialize, Serialize};

use super::field::{FieldSpec, LocatorStrategy};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMode {
    /// Pick the option whose text matches (exactly, else as a substring).
    ExactValue(String),
    /// Pick every enabled option.
    SelectAll,
}

impl AssignmentMode {
    pub fn describe(&self) -> String {
        match self {
            AssignmentMode::ExactValue(value) => value.clone(),
            AssignmentMode::SelectAll => "(all)".to_string(),
        }
    }
}

/// One filter to apply during a run, plus what was read back afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterAssignment {
    pub field: FieldSpec,
    pub mode: AssignmentMode,
    pub applied: bool,
    pub observed_value: Option<String>,
    #[serde(default)]
    pub observed: Vec<String>,
    #[serde(default)]
    pub strategy: Option<LocatorStrategy>,
}

impl FilterAssignment {
    pub fn new(field: FieldSpec, mode: AssignmentMode) -> Self {
        Self {
            field,
            mode,
            applied: false,
            observed_value: None,
            observed: Vec::new(),
            strategy: None,
        }
    }

    pub fn record(&mut self, outcome: &ApplyOutcome, strategy: LocatorStrategy) {
        self.applied = outcome.ok;
        self.observed = outcome.observed.clone();
        self.observed_value = if outcome.observed.is_empty() {
            None
        } else {
            Some(outcome.observed.join(", "))
        };
        self.strategy = Some(strategy);
    }
}

/// Result of a value-setting pass, verified by reading the control back.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub ok: bool,
    pub observed: Vec<String>,
}
