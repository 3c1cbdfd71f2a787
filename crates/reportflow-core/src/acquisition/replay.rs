use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reportflow_browser::{BrowserCookie, ExportOutcome, RecordedExchange};
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue};
use std::path::Path;
use tracing::{debug, info};

use super::{AcquisitionContext, AcquisitionStep, Produced};
use crate::models::AcquisitionStrategy;

/// Headers only a browser may set, or that would break a replay.
const STRIPPED_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "accept-encoding",
    "cookie",
    "upgrade-insecure-requests",
];

/// Re-issue a recorded document request outside the browser.
///
/// The driver records every response while the page is driven. A document
/// response from this run that never turned into a download is replayed
/// with the session's cookies, and kept only if the reply is a PDF of at
/// least the configured size.
pub struct NetworkReplay;

#[async_trait]
impl AcquisitionStep for NetworkReplay {
    fn strategy(&self) -> AcquisitionStrategy {
        AcquisitionStrategy::NetworkReplay
    }

    async fn produce(&self, ctx: &mut AcquisitionContext<'_>, staging: &Path) -> Result<Produced> {
        let downloaded = match &ctx.export {
            Some(ExportOutcome::Download { url: Some(url), .. }) => Some(url.as_str()),
            _ => None,
        };
        let exchanges = ctx.page.recorded_exchanges().await?;
        let candidates: Vec<&RecordedExchange> = exchanges
            .iter()
            .rev()
            .filter(|exchange| exchange.index >= ctx.exchange_floor)
            .filter(|exchange| Some(exchange.url.as_str()) != downloaded)
            .filter(|exchange| is_document_candidate(exchange, &ctx.settings.document_patterns))
            .collect();
        if candidates.is_empty() {
            return Ok(Produced::Nothing(
                "no document response was recorded".to_string(),
            ));
        }

        let min_bytes = ctx.settings.min_document_bytes;
        let cookies = ctx.page.cookies().await?;
        let mut last_error = None;
        for exchange in candidates {
            match replay(&ctx.http, exchange, &cookies).await {
                Ok(Some(body)) if body.len() as u64 >= min_bytes => {
                    info!(url = %exchange.url, bytes = body.len(), "Replayed document request");
                    tokio::fs::write(staging, body).await?;
                    return Ok(Produced::File { has_content: true });
                }
                Ok(Some(body)) => {
                    debug!(url = %exchange.url, bytes = body.len(), "Replayed document is undersized");
                    last_error = Some(format!("replayed document has {} bytes", body.len()));
                }
                Ok(None) => debug!(url = %exchange.url, "Replay did not return a document"),
                Err(err) => {
                    debug!(url = %exchange.url, error = %err, "Replay failed");
                    last_error = Some(err.to_string());
                }
            }

            if exchange.body_retained
                && let Some(body) = ctx.page.exchange_body(exchange.index).await?
                && body.len() as u64 >= min_bytes
                && is_document_body(exchange.content_type.as_deref(), &body)
            {
                info!(url = %exchange.url, bytes = body.len(), "Using recorded document body");
                tokio::fs::write(staging, body).await?;
                return Ok(Produced::File { has_content: true });
            }
        }

        Ok(Produced::Nothing(last_error.unwrap_or_else(|| {
            "recorded responses were not documents".to_string()
        })))
    }
}

fn is_document_candidate(exchange: &RecordedExchange, patterns: &[String]) -> bool {
    if exchange.status >= 400 || exchange.is_html() {
        return false;
    }
    let typed = exchange.content_type_contains("pdf")
        || exchange.content_type_contains("application/octet-stream");
    let url = exchange.url.to_ascii_lowercase();
    typed
        || patterns
            .iter()
            .any(|pattern| url.contains(&pattern.to_ascii_lowercase()))
}

/// Accept PDF content types, or an octet stream that starts like a PDF.
pub fn is_document_body(content_type: Option<&str>, body: &[u8]) -> bool {
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    if content_type.contains("application/pdf") || content_type.contains("application/x-pdf") {
        return !body.is_empty();
    }
    content_type.contains("application/octet-stream") && body.starts_with(b"%PDF")
}

async fn replay(
    http: &reqwest::Client,
    exchange: &RecordedExchange,
    cookies: &[BrowserCookie],
) -> Result<Option<Vec<u8>>> {
    let url = reqwest::Url::parse(&exchange.url)?;
    let method = reqwest::Method::from_bytes(exchange.method.as_bytes())?;

    let mut headers = HeaderMap::new();
    for (name, value) in &exchange.request_headers {
        let lower = name.to_ascii_lowercase();
        if lower.starts_with("sec-") || lower.starts_with(':') || STRIPPED_HEADERS.contains(&lower.as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(lower.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }
    if let Some(cookie) = cookie_header(cookies, url.host_str().unwrap_or_default()) {
        headers.insert(COOKIE, HeaderValue::from_str(&cookie)?);
    }

    let mut request = http.request(method, url).headers(headers);
    if let Some(body) = &exchange.post_data {
        request = request.body(body.clone());
    }
    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(anyhow!("Replay returned HTTP {}", response.status()));
    }
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response.bytes().await?;

    if is_document_body(content_type.as_deref(), &body) {
        Ok(Some(body.to_vec()))
    } else {
        Ok(None)
    }
}

fn cookie_header(cookies: &[BrowserCookie], host: &str) -> Option<String> {
    let pairs: Vec<String> = cookies
        .iter()
        .filter(|cookie| {
            let domain = cookie.domain.trim_start_matches('.');
            domain.is_empty() || host == domain || host.ends_with(&format!(".{}", domain))
        })
        .map(|cookie| format!("{}={}", cookie.name, cookie.value))
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}
