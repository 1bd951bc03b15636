//! Periodic traffic reports built from calendar rollups.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::metrics::{EndpointRollup, MetricsCollector, RollupView};

/// Error rate above which a report flags the period as unhealthy.
pub const ERROR_RATE_HIGHLIGHT: f64 = 0.05;

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// How many lines each ranked section of the text rendering shows.
const SECTION_LINES: usize = 5;

/// Structured report for one `[start, end]` period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyReport {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_requests: u64,
    pub total_errors: u64,
    pub error_rate: f64,
    pub avg_response_time: f64,
    pub top_endpoints: Vec<EndpointRollup>,
    pub error_breakdown: BTreeMap<String, u64>,
    pub status_code_distribution: BTreeMap<u16, u64>,
    pub hourly_distribution: BTreeMap<u32, u64>,
    pub daily_distribution: BTreeMap<u32, u64>,
}

impl From<RollupView> for WeeklyReport {
    fn from(view: RollupView) -> Self {
        Self {
            start_date: view.start_date,
            end_date: view.end_date,
            total_requests: view.total_requests,
            total_errors: view.total_errors,
            error_rate: view.error_rate,
            avg_response_time: view.avg_response_time,
            top_endpoints: view.top_endpoints,
            error_breakdown: view.error_breakdown,
            status_code_distribution: view.status_code_distribution,
            hourly_distribution: view.hourly_distribution,
            daily_distribution: view.daily_distribution,
        }
    }
}

impl WeeklyReport {
    pub fn is_error_rate_high(&self) -> bool {
        self.error_rate > ERROR_RATE_HIGHLIGHT
    }

    /// Error kinds by count, highest first, ties alphabetical.
    pub fn ranked_errors(&self) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .error_breakdown
            .iter()
            .map(|(kind, &count)| (kind.as_str(), count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    pub fn subject(&self) -> String {
        format!(
            "Traffic report ({} ~ {})",
            self.start_date.format("%Y-%m-%d"),
            self.end_date.format("%Y-%m-%d")
        )
    }
}

/// Builds reports from whatever the collector currently retains.
pub struct ReportBuilder {
    metrics: Arc<MetricsCollector>,
}

impl ReportBuilder {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self { metrics }
    }

    #[instrument(skip(self))]
    pub fn build(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> WeeklyReport {
        let report = WeeklyReport::from(self.metrics.calendar_rollup(start, end));
        info!(
            total_requests = report.total_requests,
            total_errors = report.total_errors,
            "built traffic report"
        );
        report
    }

    /// Report for the seven days ending at `now`.
    pub fn last_week(&self, now: DateTime<Utc>) -> WeeklyReport {
        self.build(now - Duration::days(7), now)
    }
}

impl fmt::Display for WeeklyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Traffic report")?;
        writeln!(
            f,
            "Period: {} ~ {}",
            self.start_date.format("%Y-%m-%d"),
            self.end_date.format("%Y-%m-%d")
        )?;

        writeln!(f)?;
        writeln!(f, "Summary")?;
        writeln!(f, "- Total requests: {}", self.total_requests)?;
        writeln!(f, "- Total errors: {}", self.total_errors)?;
        writeln!(f, "- Error rate: {:.2}%", self.error_rate * 100.0)?;
        writeln!(f, "- Average response time: {:.2}ms", self.avg_response_time)?;

        writeln!(f)?;
        writeln!(f, "Top endpoints")?;
        if self.top_endpoints.is_empty() {
            writeln!(f, "- no data")?;
        }
        for (i, ep) in self.top_endpoints.iter().take(SECTION_LINES).enumerate() {
            writeln!(
                f,
                "{}. {} - {} requests ({} errors, avg {:.2}ms)",
                i + 1,
                ep.endpoint,
                ep.count,
                ep.error_count,
                ep.avg_duration
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Errors by type")?;
        if self.error_breakdown.is_empty() {
            writeln!(f, "- no errors")?;
        }
        for (kind, count) in self.ranked_errors().into_iter().take(SECTION_LINES) {
            writeln!(f, "- {kind}: {count}")?;
        }

        writeln!(f)?;
        writeln!(f, "Status codes")?;
        if self.status_code_distribution.is_empty() {
            writeln!(f, "- no data")?;
        }
        for (code, count) in &self.status_code_distribution {
            writeln!(f, "- {code}: {count}")?;
        }

        writeln!(f)?;
        writeln!(f, "Requests by weekday")?;
        if self.daily_distribution.is_empty() {
            writeln!(f, "- no data")?;
        }
        for (&day, count) in &self.daily_distribution {
            let name = WEEKDAY_NAMES.get(day as usize).copied().unwrap_or("?");
            writeln!(f, "- {name}: {count}")?;
        }

        Ok(())
    }
}

impl WeeklyReport {
    /// HTML rendering used as the rich alternative of emailed reports.
    pub fn to_html(&self) -> String {
        HtmlReport(self).to_string()
    }
}

struct HtmlReport<'a>(&'a WeeklyReport);

impl fmt::Display for HtmlReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let rate_class = if report.is_error_rate_high() {
            "error-highlight"
        } else {
            "success-highlight"
        };

        writeln!(f, "<!DOCTYPE html>")?;
        writeln!(f, "<html>\n<head>\n<meta charset=\"utf-8\">")?;
        writeln!(f, "<title>{}</title>", escape_html(&report.subject()))?;
        writeln!(f, "<style>{HTML_STYLE}</style>\n</head>\n<body>")?;
        writeln!(f, "<h1>Traffic report</h1>")?;
        writeln!(
            f,
            "<p><strong>Period:</strong> {} ~ {}</p>",
            report.start_date.format("%Y-%m-%d"),
            report.end_date.format("%Y-%m-%d")
        )?;

        writeln!(f, "<div class=\"summary-box\">\n<h2>Summary</h2>")?;
        metric(f, "Total requests", &report.total_requests.to_string(), "")?;
        metric(f, "Total errors", &report.total_errors.to_string(), "error-highlight")?;
        metric(
            f,
            "Error rate",
            &format!("{:.2}%", report.error_rate * 100.0),
            rate_class,
        )?;
        metric(
            f,
            "Average response time",
            &format!("{:.2}ms", report.avg_response_time),
            "",
        )?;
        writeln!(f, "</div>")?;

        writeln!(f, "<h2>Top endpoints</h2>\n<ul>")?;
        if report.top_endpoints.is_empty() {
            writeln!(f, "<li>no data</li>")?;
        }
        for ep in report.top_endpoints.iter().take(SECTION_LINES) {
            writeln!(
                f,
                "<li>{} - {} requests ({} errors, avg {:.2}ms)</li>",
                escape_html(&ep.endpoint),
                ep.count,
                ep.error_count,
                ep.avg_duration
            )?;
        }
        writeln!(f, "</ul>")?;

        writeln!(f, "<h2>Errors by type</h2>\n<ul>")?;
        if report.error_breakdown.is_empty() {
            writeln!(f, "<li>no errors</li>")?;
        }
        for (kind, count) in report.ranked_errors().into_iter().take(SECTION_LINES) {
            writeln!(f, "<li>{}: {count}</li>", escape_html(kind))?;
        }
        writeln!(f, "</ul>")?;

        writeln!(f, "<h2>Status codes</h2>\n<ul>")?;
        for (code, count) in &report.status_code_distribution {
            writeln!(f, "<li>{code}: {count}</li>")?;
        }
        writeln!(f, "</ul>")?;

        writeln!(f, "<h2>Requests by weekday</h2>\n<ul>")?;
        for (&day, count) in &report.daily_distribution {
            let name = WEEKDAY_NAMES.get(day as usize).copied().unwrap_or("?");
            writeln!(f, "<li>{name}: {count}</li>")?;
        }
        writeln!(f, "</ul>")?;

        writeln!(
            f,
            "<div class=\"footer\">Generated {}</div>",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(f, "</body>\n</html>")
    }
}

const HTML_STYLE: &str = "body{font-family:Arial,sans-serif;max-width:800px;margin:0 auto;padding:20px;color:#333}\
h1{color:#2563eb;border-bottom:3px solid #2563eb;padding-bottom:10px}\
.summary-box{background:#f3f4f6;border-left:4px solid #2563eb;padding:15px;margin:20px 0}\
.metric{display:inline-block;margin:10px 20px 10px 0}\
.metric-label{font-size:0.9em;color:#6b7280}\
.metric-value{font-size:1.5em;font-weight:bold;color:#1f2937}\
.error-highlight{color:#dc2626}\
.success-highlight{color:#059669}\
ul{list-style-type:none;padding-left:0}\
.footer{margin-top:40px;border-top:1px solid #e5e7eb;color:#6b7280;font-size:0.9em}";

fn metric(f: &mut fmt::Formatter<'_>, label: &str, value: &str, class: &str) -> fmt::Result {
    writeln!(
        f,
        "<div class=\"metric\"><div class=\"metric-label\">{label}</div>\
         <div class=\"metric-value {class}\">{value}</div></div>"
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
