//! Print-oriented HTML for the DOM render fallback.

use std::collections::HashMap;

const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{title}}</title>
<style>
@page { size: A4 landscape; margin: 12mm; }
body { font-family: Arial, Helvetica, sans-serif; font-size: 10pt; color: #111; }
h1 { font-size: 15pt; margin: 0 0 4pt 0; }
.period { margin: 0 0 8pt 0; color: #444; }
table.filters { border-collapse: collapse; margin-bottom: 10pt; }
table.filters th { text-align: left; padding: 2pt 10pt 2pt 0; }
table.filters td { padding: 2pt 0; }
.report table { border-collapse: collapse; width: 100%; }
.report th, .report td { border: 1px solid #999; padding: 3pt; }
.report tr { page-break-inside: avoid; }
.empty { margin-top: 16pt; font-size: 12pt; font-weight: bold; }
</style>
</head>
<body>
<h1>{{title}}</h1>
<p class="period">{{period}}</p>
<table class="filters">
{{filters}}
</table>
<div class="report">
{{body}}
</div>
</body>
</html>
"#;

/// Render placeholders in a single pass to prevent second-order substitutions.
///
/// Placeholder keys must include delimiters (for example, `"{{title}}"`).
/// Unknown placeholders are kept unchanged.
pub fn render_template_single_pass(template: &str, replacements: &HashMap<&str, &str>) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        rendered.push_str(&rest[..start]);
        if let Some(end_offset) = rest[start..].find("}}") {
            let key = &rest[start..start + end_offset + 2];
            if let Some(value) = replacements.get(key) {
                rendered.push_str(value);
            } else {
                rendered.push_str(key);
            }
            rest = &rest[start + end_offset + 2..];
        } else {
            rendered.push_str(&rest[start..]);
            rest = "";
        }
    }
    rendered.push_str(rest);
    rendered
}

/// Content of a rendered report document.
#[derive(Debug, Clone, Default)]
pub struct ReportDocument {
    pub title: String,
    pub period: String,
    /// Field label and the values read back from the page.
    pub filters: Vec<(String, Vec<String>)>,
    /// Raw table markup captured from the page; trusted as-is.
    pub table_html: Option<String>,
    pub empty_message: Option<String>,
}

pub fn render_report_html(document: &ReportDocument) -> String {
    let title = html_escape::encode_text(&document.title);
    let period = html_escape::encode_text(&document.period);

    let filters = document
        .filters
        .iter()
        .map(|(label, values)| {
            let shown = if values.is_empty() {
                "-".to_string()
            } else {
                values.join(", ")
            };
            format!(
                "<tr><th>{}</th><td>{}</td></tr>",
                html_escape::encode_text(label),
                html_escape::encode_text(&shown)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    // An empty result is stated even when the page still shows a marker grid.
    let body = match (&document.table_html, &document.empty_message) {
        (_, Some(message)) => format!(
            "<p class=\"empty\">{}</p>",
            html_escape::encode_text(message)
        ),
        (Some(table), None) => table.clone(),
        (None, None) => String::new(),
    };

    let replacements = HashMap::from([
        ("{{title}}", title.as_ref()),
        ("{{period}}", period.as_ref()),
        ("{{filters}}", filters.as_str()),
        ("{{body}}", body.as_str()),
    ]);
    render_template_single_pass(REPORT_TEMPLATE, &replacements)
}
