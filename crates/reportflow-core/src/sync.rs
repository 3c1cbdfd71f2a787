//! Dependent-Field Synchronizer
//!
//! Waits for a downstream list to be refreshed after its upstream field
//! changed. Two signals are raced: the network exchange that fetches the
//! options, and the options themselves appearing in the DOM.

use anyhow::Result;
use reportflow_browser::{ControlHandle, ReportPage, normalize_text};
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::LocatedControl;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct DependentFieldSync<'a> {
    page: &'a dyn ReportPage,
    /// Native list whose options are watched.
    list: ControlHandle,
    baseline: usize,
}

impl<'a> DependentFieldSync<'a> {
    /// Record the downstream option count before the upstream field changes.
    pub async fn observe(page: &'a dyn ReportPage, downstream: &LocatedControl) -> Result<Self> {
        let list = downstream
            .backing
            .as_ref()
            .map(|backing| backing.handle.clone())
            .unwrap_or_else(|| downstream.control.handle.clone());
        let baseline = page.read_control(&list).await?.options.len();
        debug!(handle = %list, baseline, "Recorded dependent option baseline");
        Ok(Self {
            page,
            list,
            baseline,
        })
    }

    pub fn baseline(&self) -> usize {
        self.baseline
    }

    /// `true` as soon as either signal holds, `false` at `timeout`.
    ///
    /// `response_hint` is a URL substring of the request that loads the
    /// options; without one only the DOM is watched.
    pub async fn wait_for_dependent_option(
        &self,
        expected_text: &str,
        response_hint: Option<&str>,
        timeout: Duration,
    ) -> bool {
        let network = async {
            match response_hint {
                Some(hint) => match self.page.wait_for_response(hint, timeout).await {
                    Ok(seen) => seen,
                    Err(err) => {
                        warn!(error = %err, "Response wait failed");
                        false
                    }
                },
                None => false,
            }
        };

        tokio::select! {
            true = network => {
                debug!(expected = expected_text, "Dependent field refreshed (network)");
                true
            }
            true = self.poll_options(expected_text) => {
                debug!(expected = expected_text, "Dependent field refreshed (options)");
                true
            }
            _ = tokio::time::sleep(timeout) => {
                warn!(expected = expected_text, ?timeout, "Dependent field did not refresh in time");
                false
            }
        }
    }

    async fn poll_options(&self, expected_text: &str) -> bool {
        let expected = normalize_text(expected_text);
        loop {
            match self.page.read_control(&self.list).await {
                Ok(control) => {
                    let present = control
                        .options
                        .iter()
                        .any(|option| normalize_text(&option.text).contains(&expected));
                    if control.options.len() > self.baseline && present {
                        return true;
                    }
                }
                Err(err) => debug!(error = %err, "Dependent list read failed"),
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
