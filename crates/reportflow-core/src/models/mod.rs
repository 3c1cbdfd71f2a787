//! Per-run data model of the extraction engine.

pub mod acquisition;
pub mod date_format;
pub mod field;
pub mod filter;
pub mod readiness;

pub use acquisition::{AcquisitionAttempt, AcquisitionOutcome, AcquisitionStrategy};
pub use date_format::{DateEncoding, DateFormatCandidate, build_candidates};
pub use field::{
    FieldRole, FieldSpec, LocatedControl, LocatorStrategy, SelectorDescriptor, WidgetKind,
};
pub use filter::{ApplyOutcome, AssignmentMode, FilterAssignment};
pub use readiness::{Readiness, ReadinessSignal};
