//! ReportFlow Core - resilient report extraction engine.
//!
//! Drives one uncooperative report page through a [`ReportPage`]:
//! locating and setting filters across widget families, waiting for
//! dependent fields, discovering the accepted date encoding, verifying
//! readiness and acquiring a valid PDF through an ordered cascade.
//!
//! [`ReportPage`]: reportflow_browser::ReportPage

pub mod acquisition;
pub mod channel;
pub mod error;
pub mod locator;
pub mod models;
pub mod paths;
pub mod profile;
pub mod resolver;
pub mod runner;
pub mod session;
pub mod setter;
pub mod submission;
pub mod sync;
pub mod template;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use acquisition::{AcquisitionCascade, AcquisitionContext, SummaryField};
pub use channel::{DeliveryResult, DeliverySink, TelegramConfig, TelegramSink};
pub use error::{ExtractionError, Result};
pub use locator::ControlLocator;
pub use models::*;
pub use profile::{BusinessRun, DateSettings, SiteProfile, StaticFilter};
pub use resolver::DateFormatResolver;
pub use runner::{ExtractionReport, ReportRunner, RunReport};
pub use session::{Credentials, SessionBootstrap};
pub use setter::ValueSetter;
pub use submission::SubmissionVerifier;
pub use sync::DependentFieldSync;
