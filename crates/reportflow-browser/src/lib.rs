//! Browser layer for ReportFlow.
//!
//! This crate owns everything that touches a live page. It provides:
//! - The [`ReportPage`] trait, the single seam the extraction engine drives
//! - Plain data types describing controls, overlay menus, report state and
//!   recorded network traffic
//! - [`PlaywrightPage`], a persistent Chromium session driven through a
//!   long-lived Node.js/Playwright process speaking JSON lines
//! - Runtime probing for the Node.js and Playwright prerequisites

mod driver;
mod page;
mod probe;
mod protocol;
mod types;

pub use driver::{LaunchOptions, PlaywrightPage};
pub use page::ReportPage;
pub use probe::{RuntimeProbe, ensure_probe_ready, probe_runtime};
pub use protocol::{DRIVER_MARKER, DriverCommand, DriverReply};
pub use types::*;
