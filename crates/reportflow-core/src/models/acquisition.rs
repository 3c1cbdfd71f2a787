use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The ordered ways of obtaining the final document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionStrategy {
    DirectDownload,
    PopupWindow,
    NetworkReplay,
    DomRender,
    ScreenshotRender,
}

impl AcquisitionStrategy {
    pub const ORDER: [AcquisitionStrategy; 5] = [
        AcquisitionStrategy::DirectDownload,
        AcquisitionStrategy::PopupWindow,
        AcquisitionStrategy::NetworkReplay,
        AcquisitionStrategy::DomRender,
        AcquisitionStrategy::ScreenshotRender,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AcquisitionStrategy::DirectDownload => "direct_download",
            AcquisitionStrategy::PopupWindow => "popup_window",
            AcquisitionStrategy::NetworkReplay => "network_replay",
            AcquisitionStrategy::DomRender => "dom_render",
            AcquisitionStrategy::ScreenshotRender => "screenshot_render",
        }
    }

    /// Checks a strategy's output against the size threshold.
    ///
    /// Rendered output must also carry content. The screenshot render is the
    /// last resort and is accepted whenever it produced anything at all.
    pub fn accepts(self, byte_size: u64, has_content: bool, min_bytes: u64) -> bool {
        if byte_size == 0 {
            return false;
        }
        match self {
            AcquisitionStrategy::ScreenshotRender => has_content,
            AcquisitionStrategy::DomRender => has_content && byte_size >= min_bytes,
            _ => byte_size >= min_bytes,
        }
    }
}

impl fmt::Display for AcquisitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One strategy's try during an acquisition cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcquisitionAttempt {
    pub strategy: AcquisitionStrategy,
    pub byte_size: u64,
    pub valid: bool,
    #[serde(default)]
    pub note: Option<String>,
}

/// Result of a full cascade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcquisitionOutcome {
    pub ok: bool,
    pub size: u64,
    pub strategy: Option<AcquisitionStrategy>,
    pub path: Option<PathBuf>,
    pub attempts: Vec<AcquisitionAttempt>,
}
