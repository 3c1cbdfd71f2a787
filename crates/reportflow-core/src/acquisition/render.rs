use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use super::{AcquisitionContext, AcquisitionStep, Produced};
use crate::models::{AcquisitionStrategy, Readiness};
use crate::setter::observed_values;
use crate::template::{ReportDocument, render_report_html};

/// Print the report table, wrapped with a filter summary, to PDF.
///
/// The summary reads every filter back from the page at render time, so
/// it shows what was applied rather than what was intended.
pub struct DomRender;

#[async_trait]
impl AcquisitionStep for DomRender {
    fn strategy(&self) -> AcquisitionStrategy {
        AcquisitionStrategy::DomRender
    }

    async fn produce(&self, ctx: &mut AcquisitionContext<'_>, staging: &Path) -> Result<Produced> {
        let snapshot = ctx.page.report_snapshot(ctx.probe).await?;
        let mut table_html = snapshot
            .table_html
            .filter(|html| !html.trim().is_empty());
        if table_html.is_none() && ctx.readiness == Readiness::Data {
            table_html = captured_table(ctx).await?;
        }

        let mut filters = Vec::with_capacity(ctx.summary.len());
        for field in &ctx.summary {
            let values = match ctx.page.read_control(&field.handle).await {
                Ok(control) => observed_values(&control),
                Err(err) => {
                    debug!(field = %field.label, error = %err, "Summary readback failed");
                    Vec::new()
                }
            };
            filters.push((field.label.clone(), values));
        }

        let empty_message = (ctx.readiness == Readiness::Empty).then(|| {
            snapshot
                .empty_marker
                .clone()
                .unwrap_or_else(|| ctx.settings.empty_message.clone())
        });
        let has_content = table_html.is_some() || empty_message.is_some();

        let html = render_report_html(&ReportDocument {
            title: ctx.title.clone(),
            period: ctx.period.clone(),
            filters,
            table_html,
            empty_message,
        });
        ctx.page.render_pdf(&html, staging).await?;
        Ok(Produced::File { has_content })
    }
}

/// Report table from the most recent server HTML body this run recorded.
async fn captured_table(ctx: &AcquisitionContext<'_>) -> Result<Option<String>> {
    let exchanges = ctx.page.recorded_exchanges().await?;
    for exchange in exchanges
        .iter()
        .rev()
        .filter(|exchange| exchange.index >= ctx.exchange_floor && exchange.is_html())
    {
        if !exchange.body_retained {
            continue;
        }
        let Some(body) = ctx.page.exchange_body(exchange.index).await? else {
            continue;
        };
        let html = String::from_utf8_lossy(&body);
        if let Some(table) = extract_table(&html, &ctx.probe.table_selector) {
            debug!(url = %exchange.url, "Using report table from captured response");
            return Ok(Some(table));
        }
    }
    Ok(None)
}

/// Pull one complete `<table>` element out of `html`.
///
/// An `#id` selector picks the table with that id; otherwise the table
/// with the most rows wins. Nested tables are kept whole.
pub fn extract_table(html: &str, selector: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let tables: Vec<(usize, usize)> = lower
        .match_indices("<table")
        .filter_map(|(start, _)| balanced_end(&lower, start).map(|end| (start, end)))
        .collect();

    let wanted_id = selector
        .strip_prefix('#')
        .map(|id| id.to_ascii_lowercase());
    let by_id = wanted_id.and_then(|id| {
        tables.iter().copied().find(|&(start, _)| {
            let tag_end = lower[start..]
                .find('>')
                .map(|offset| start + offset)
                .unwrap_or(lower.len());
            let tag = &lower[start..tag_end];
            tag.contains(&format!("id=\"{}\"", id)) || tag.contains(&format!("id='{}'", id))
        })
    });

    let (start, end) = by_id.or_else(|| {
        tables
            .iter()
            .copied()
            .max_by_key(|&(start, end)| lower[start..end].matches("<tr").count())
    })?;
    let table = &html[start..end];
    table.to_ascii_lowercase().contains("<tr").then(|| table.to_string())
}

fn balanced_end(lower: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut cursor = start;
    loop {
        let next_open = lower[cursor..].find("<table").map(|i| cursor + i);
        let next_close = lower[cursor..].find("</table>").map(|i| cursor + i)?;
        match next_open {
            Some(open) if open < next_close => {
                depth += 1;
                cursor = open + "<table".len();
            }
            _ => {
                depth = depth.saturating_sub(1);
                cursor = next_close + "</table>".len();
                if depth == 0 {
                    return Some(cursor);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{AcquisitionSettings, SummaryField};
    use crate::testing::{FixturePage, ReportFixture, ReportOutcome};
    use reportflow_browser::{ControlHandle, RecordedExchange, ReportPage, ReportProbe};
    use std::collections::HashMap;

    fn probe() -> ReportProbe {
        ReportProbe {
            table_selector: "#gvReport".to_string(),
            empty_markers: vec!["No records".to_string()],
            period_selector: None,
            region_selector: None,
        }
    }

    #[test]
    fn extracts_table_by_id_with_nested_tables() {
        let html = r#"<html><body>
<table id="layout"><tr><td>menu</td></tr></table>
<TABLE id="gvReport"><tr><td><table><tr><td>inner</td></tr></table></td></tr><tr><td>2</td></tr></TABLE>
</body></html>"#;
        let table = extract_table(html, "#gvReport").unwrap();
        assert!(table.starts_with("<TABLE id=\"gvReport\">"));
        assert!(table.ends_with("</TABLE>"));
        assert!(table.contains("inner"));
    }

    #[test]
    fn falls_back_to_largest_table() {
        let html = "<table><tr><td>a</td></tr></table><table><tr></tr><tr></tr><tr></tr></table>";
        let table = extract_table(html, ".grid").unwrap();
        assert_eq!(table.matches("<tr>").count(), 3);
        assert!(extract_table("<p>none</p>", "#gvReport").is_none());
    }

    #[tokio::test]
    async fn renders_summary_from_readback_and_live_table() {
        let temp = tempfile::tempdir().unwrap();
        let staging = temp.path().join("doc.part");
        let page = FixturePage::new()
            .with_native("r", "Division Office", &["R1", "R2"])
            .with_input("from", "From Date")
            .with_report(ReportFixture {
                submit_selector: "#btnShow".to_string(),
                from_input: ControlHandle::new("from"),
                accepted_from: "26/07/2024".to_string(),
                outcome: ReportOutcome::Rows {
                    rows: 1,
                    table_html: "<table id=\"gvReport\"><tr><td>Work 17</td></tr></table>".to_string(),
                    period_text: None,
                },
                slow_submissions: 0,
                response_url: "/ReportView.aspx".to_string(),
            });
        page.select_options(&ControlHandle::new("r"), &["R2".to_string()], false)
            .await
            .unwrap();
        page.fill(&ControlHandle::new("from"), "26/07/2024").await.unwrap();
        page.click("#btnShow").await.unwrap();

        let settings = AcquisitionSettings::default();
        let probe = probe();
        let mut ctx = AcquisitionContext::new(&page, &settings, &probe).unwrap();
        ctx.title = "Delayed Works".to_string();
        ctx.summary = vec![SummaryField {
            label: "Division Office".to_string(),
            handle: ControlHandle::new("r"),
        }];

        let produced = DomRender.produce(&mut ctx, &staging).await.unwrap();
        assert_eq!(produced, Produced::File { has_content: true });
        let html = page.rendered_html().pop().unwrap();
        assert!(html.contains("<tr><th>Division Office</th><td>R2</td></tr>"));
        assert!(html.contains("Work 17"));
    }

    #[tokio::test]
    async fn uses_captured_html_when_live_table_is_gone() {
        let temp = tempfile::tempdir().unwrap();
        let exchange = RecordedExchange {
            index: 0,
            url: "https://works.example/ReportView.aspx".to_string(),
            method: "POST".to_string(),
            status: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            request_headers: HashMap::new(),
            post_data: None,
            body_size: None,
            body_retained: true,
        };
        let body = b"<html><table id=\"gvReport\"><tr><td>Captured</td></tr></table></html>".to_vec();
        let page = FixturePage::new().with_exchange(exchange, Some(body));
        let settings = AcquisitionSettings::default();
        let probe = probe();
        let mut ctx = AcquisitionContext::new(&page, &settings, &probe).unwrap();

        let produced = DomRender
            .produce(&mut ctx, &temp.path().join("doc.part"))
            .await
            .unwrap();
        assert_eq!(produced, Produced::File { has_content: true });
        assert!(page.rendered_html()[0].contains("Captured"));
    }

    #[tokio::test]
    async fn captured_html_from_an_earlier_run_is_ignored() {
        let temp = tempfile::tempdir().unwrap();
        let exchange = RecordedExchange {
            index: 0,
            url: "https://works.example/ReportView.aspx".to_string(),
            method: "POST".to_string(),
            status: 200,
            content_type: Some("text/html".to_string()),
            request_headers: HashMap::new(),
            post_data: None,
            body_size: None,
            body_retained: true,
        };
        let body = b"<table id=\"gvReport\"><tr><td>Delayed rows</td></tr></table>".to_vec();
        let page = FixturePage::new().with_exchange(exchange, Some(body));
        let settings = AcquisitionSettings::default();
        let probe = probe();
        let mut ctx = AcquisitionContext::new(&page, &settings, &probe).unwrap();
        ctx.exchange_floor = 1;

        let produced = DomRender
            .produce(&mut ctx, &temp.path().join("doc.part"))
            .await
            .unwrap();
        assert_eq!(produced, Produced::File { has_content: false });
        assert!(!page.rendered_html()[0].contains("Delayed rows"));
    }

    #[tokio::test]
    async fn empty_result_is_stated() {
        let temp = tempfile::tempdir().unwrap();
        let page = FixturePage::new();
        let settings = AcquisitionSettings::default();
        let probe = probe();
        let mut ctx = AcquisitionContext::new(&page, &settings, &probe).unwrap();
        ctx.readiness = Readiness::Empty;

        let produced = DomRender
            .produce(&mut ctx, &temp.path().join("doc.part"))
            .await
            .unwrap();
        assert_eq!(produced, Produced::File { has_content: true });
        assert!(page.rendered_html()[0].contains(&settings.empty_message));
    }

    #[tokio::test]
    async fn missing_table_has_no_content() {
        let temp = tempfile::tempdir().unwrap();
        let page = FixturePage::new();
        let settings = AcquisitionSettings::default();
        let probe = probe();
        let mut ctx = AcquisitionContext::new(&page, &settings, &probe).unwrap();

        let produced = DomRender
            .produce(&mut ctx, &temp.path().join("doc.part"))
            .await
            .unwrap();
        assert_eq!(produced, Produced::File { has_content: false });
    }
}
