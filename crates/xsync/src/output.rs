//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one record per line.

use std::io::{self, Write};

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use xsync_core::{KindReport, Outcome, RejectedRow, RunReport, Summary};

use crate::cli::OutputFormat;

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serializable items in the chosen format.
///
/// - `table`: `to_row` builds one `Tabled` row per item
/// - `json` / `json-compact` / `yaml`: serializes the original data
/// - `plain`: `line_fn` emits one line per item
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    line_fn: impl Fn(&T) -> String,
) -> String
where
    T: Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(line_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serializable item in the chosen format.
///
/// Table and plain rendering use pre-formatted strings from the caller.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    line_fn: impl Fn(&T) -> String,
) -> String
where
    T: Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => line_fn(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {e}\"}}"))
}

fn render_yaml<T: Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("error: serialization failed: {e}"))
}

// ── Summaries ────────────────────────────────────────────────────────

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Added")]
    added: u64,
    #[tabled(rename = "Updated")]
    updated: u64,
    #[tabled(rename = "Removed")]
    removed: u64,
    #[tabled(rename = "Failed")]
    failed: u64,
    #[tabled(rename = "Skipped add")]
    skipped_add: u64,
    #[tabled(rename = "Skipped delete")]
    skipped_delete: u64,
}

impl From<&Summary> for SummaryRow {
    fn from(s: &Summary) -> Self {
        Self {
            added: s.added,
            updated: s.updated,
            removed: s.removed,
            failed: s.failed,
            skipped_add: s.skipped_idempotent_add,
            skipped_delete: s.skipped_idempotent_delete,
        }
    }
}

/// `key=value` pairs for plain output.
pub fn summary_line(s: &Summary) -> String {
    format!(
        "added={} updated={} removed={} failed={} skipped_add={} skipped_delete={}",
        s.added,
        s.updated,
        s.removed,
        s.failed,
        s.skipped_idempotent_add,
        s.skipped_idempotent_delete
    )
}

pub fn summary_table(s: &Summary) -> String {
    render_table(&[SummaryRow::from(s)])
}

// ── Feed runs ────────────────────────────────────────────────────────

#[derive(Tabled)]
struct KindRow {
    #[tabled(rename = "Group")]
    kind: String,
    #[tabled(rename = "Tags")]
    tags: String,
    #[tabled(rename = "Desired")]
    desired: usize,
    #[tabled(rename = "Added")]
    added: String,
    #[tabled(rename = "Updated")]
    updated: String,
    #[tabled(rename = "Removed")]
    removed: String,
    #[tabled(rename = "Failed")]
    failed: String,
    #[tabled(rename = "Skipped")]
    skipped: String,
    #[tabled(rename = "Error")]
    error: String,
}

fn count(summary: Option<&Summary>, f: impl Fn(&Summary) -> u64) -> String {
    summary.map_or_else(|| "-".into(), |s| f(s).to_string())
}

fn kind_row(k: &KindReport) -> KindRow {
    let s = k.summary.as_ref();
    KindRow {
        kind: k.kind.clone(),
        tags: k.tags.join(", "),
        desired: k.desired,
        added: count(s, |s| s.added),
        updated: count(s, |s| s.updated),
        removed: count(s, |s| s.removed),
        failed: count(s, |s| s.failed),
        skipped: count(s, |s| s.skipped_idempotent_add + s.skipped_idempotent_delete),
        error: k.error.clone().unwrap_or_default(),
    }
}

fn kind_line(k: &KindReport) -> String {
    match (&k.summary, &k.error) {
        (_, Some(error)) => format!("{} error={error}", k.kind),
        (Some(summary), None) => format!("{} {}", k.kind, summary_line(summary)),
        (None, None) => k.kind.clone(),
    }
}

/// Per-group table (or lines) for a feed run.
pub fn render_kinds(format: OutputFormat, kinds: &[KindReport]) -> String {
    render_list(format, kinds, kind_row, kind_line)
}

/// A whole feed run: the revision it was archived under plus one row per group.
pub fn render_run(format: OutputFormat, report: &RunReport) -> String {
    match format {
        OutputFormat::Table | OutputFormat::Plain => {
            let revision = report
                .revision
                .map_or_else(|| "unarchived".into(), |r| r.to_string());
            let body = if report.kinds.is_empty() {
                "no inbound groups to reconcile".to_owned()
            } else {
                render_kinds(format, &report.kinds)
            };
            format!("revision {revision}\n{body}")
        }
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
            render_single(format, report, |_| String::new(), |_| String::new())
        }
    }
}

// ── Single-user operations ───────────────────────────────────────────

/// Result of `add` / `del`.
#[derive(Debug, Serialize)]
pub struct OpReport {
    pub op: &'static str,
    pub id: String,
    pub outcome: &'static str,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
}

pub fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Added => "added",
        Outcome::Updated => "updated",
        Outcome::Removed => "removed",
        Outcome::Failed => "failed",
        Outcome::SkippedIdempotentAdd => "skipped_idempotent_add",
        Outcome::SkippedIdempotentDelete => "skipped_idempotent_delete",
    }
}

pub fn render_op(format: OutputFormat, report: &OpReport) -> String {
    render_single(
        format,
        report,
        |r| {
            let out = format!("{} {}: {} on [{}]", r.op, r.id, r.outcome, r.tags.join(", "));
            match r.store {
                Some(ref store) => format!("{out}\nstore: {store}"),
                None => out,
            }
        },
        |r| format!("{} {}", r.id, r.outcome),
    )
}

// ── Bulk additions ───────────────────────────────────────────────────

/// Result of `bulk-add`.
#[derive(Debug, Serialize)]
pub struct BulkReport {
    pub summary: Summary,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Tabled)]
struct RejectedTableRow {
    #[tabled(rename = "Line")]
    line: u64,
    #[tabled(rename = "Reason")]
    reason: String,
}

pub fn render_bulk(format: OutputFormat, report: &BulkReport) -> String {
    render_single(
        format,
        report,
        |r| {
            let mut out = summary_table(&r.summary);
            if !r.rejected.is_empty() {
                let rows: Vec<_> = r
                    .rejected
                    .iter()
                    .map(|row| RejectedTableRow {
                        line: row.line,
                        reason: row.reason.clone(),
                    })
                    .collect();
                out.push_str("\n\nRejected rows:\n");
                out.push_str(&render_table(&rows));
            }
            out
        },
        |r| {
            let mut lines = vec![summary_line(&r.summary)];
            lines.extend(
                r.rejected
                    .iter()
                    .map(|row| format!("rejected line={} reason={}", row.line, row.reason)),
            );
            lines.join("\n")
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> Summary {
        Summary {
            added: 3,
            updated: 1,
            removed: 2,
            failed: 1,
            skipped_idempotent_add: 4,
            skipped_idempotent_delete: 0,
        }
    }

    #[test]
    fn plain_summary_is_key_value() {
        assert_eq!(
            summary_line(&summary()),
            "added=3 updated=1 removed=2 failed=1 skipped_add=4 skipped_delete=0"
        );
    }

    #[test]
    fn json_keeps_field_names() {
        let rendered = render_single(
            OutputFormat::JsonCompact,
            &summary(),
            summary_table,
            summary_line,
        );
        let value: serde_json::Value = serde_json::from_str(&rendered).expect("valid json");
        assert_eq!(value["skipped_idempotent_add"], 4);
        assert_eq!(value["failed"], 1);
    }

    #[test]
    fn aborted_kind_shows_its_error() {
        let kinds = vec![
            KindReport {
                kind: "vless".into(),
                tags: vec!["in-v".into()],
                desired: 2,
                summary: Some(summary()),
                error: None,
            },
            KindReport {
                kind: "vmess".into(),
                tags: vec!["in-m".into()],
                desired: 2,
                summary: None,
                error: Some("connection refused".into()),
            },
        ];

        let plain = render_kinds(OutputFormat::Plain, &kinds);
        let lines: Vec<_> = plain.lines().collect();
        assert!(lines[0].starts_with("vless added=3"));
        assert_eq!(lines[1], "vmess error=connection refused");

        let table = render_kinds(OutputFormat::Table, &kinds);
        assert!(table.contains("connection refused"));
        assert!(table.contains("in-v"));
    }

    #[test]
    fn bulk_plain_lists_rejected_rows() {
        let report = BulkReport {
            summary: Summary {
                added: 1,
                ..Summary::default()
            },
            rejected: vec![RejectedRow {
                line: 3,
                reason: "unknown protocol 'trojan'".into(),
            }],
        };
        let plain = render_bulk(OutputFormat::Plain, &report);
        assert!(plain.ends_with("rejected line=3 reason=unknown protocol 'trojan'"));
    }
}
