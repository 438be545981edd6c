// src/recording/report.rs
//! Vulnerability report types and index rendering
//!
//! A report is immutable once created: ids are assigned in creation order
//! (`vuln-0001`, `vuln-0002`, ...) and never reused or renumbered. The
//! consolidated CSV and JSONL indices are rendered from the full report
//! set every flush, sorted by severity rank then timestamp, so they stay
//! complete and consistently ordered even though the per-finding Markdown
//! detail files are written at most once each.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Timestamp format used in reports; lexicographic order matches
/// chronological order, which the index sort relies on.
pub const REPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// One recorded finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityReport {
    /// Stable 4-digit-padded sequence id (`vuln-0001`, ...)
    pub id: String,

    /// Trimmed title
    pub title: String,

    /// Trimmed description
    pub content: String,

    /// Lowercased, trimmed severity (critical, high, medium, low, info)
    pub severity: String,

    /// Creation time, [`REPORT_TIMESTAMP_FORMAT`]
    pub timestamp: String,

    /// Optional CVSS score
    pub cvss_score: Option<f64>,

    /// Reference URLs
    pub references: Vec<String>,

    /// Suggested remediation
    pub fix_recommendation: Option<String>,

    /// CWE identifiers
    pub cwe: Vec<String>,
}

impl VulnerabilityReport {
    /// Relative path of this report's detail file inside the run directory
    pub fn detail_file(&self) -> String {
        format!("vulnerabilities/{}.md", self.id)
    }

    /// Render the per-finding Markdown detail file
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", self.title);
        let _ = writeln!(out, "**ID:** {}", self.id);
        let _ = writeln!(out, "**Severity:** {}", self.severity.to_uppercase());
        if let Some(cvss) = self.cvss_score {
            let _ = writeln!(out, "**CVSS:** {}", cvss);
        }
        if !self.cwe.is_empty() {
            let _ = writeln!(out, "**CWE:** {}", self.cwe.join(", "));
        }
        let _ = writeln!(out, "**Found:** {}\n", self.timestamp);
        let _ = writeln!(out, "## Description\n");
        let _ = writeln!(out, "{}", self.content);
        if let Some(fix) = &self.fix_recommendation {
            let _ = writeln!(out, "\n## Fix Recommendation\n");
            let _ = writeln!(out, "{}", fix);
        }
        if !self.references.is_empty() {
            let _ = writeln!(out, "\n## References\n");
            for reference in &self.references {
                let _ = writeln!(out, "- {}", reference);
            }
        }
        out
    }
}

/// Rank used for index ordering: critical sorts first, unknown severities
/// sort after info.
pub fn severity_rank(severity: &str) -> u8 {
    match severity {
        "critical" => 0,
        "high" => 1,
        "medium" => 2,
        "low" => 3,
        "info" => 4,
        _ => 5,
    }
}

/// Sort reports by (severity rank, timestamp ascending). Stable, so equal
/// keys keep insertion order.
pub fn sorted_for_index(reports: &[VulnerabilityReport]) -> Vec<VulnerabilityReport> {
    let mut sorted = reports.to_vec();
    sorted.sort_by(|a, b| {
        severity_rank(&a.severity)
            .cmp(&severity_rank(&b.severity))
            .then_with(|| a.timestamp.cmp(&b.timestamp))
    });
    sorted
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render the consolidated CSV index. Callers pass reports already sorted
/// by [`sorted_for_index`].
pub fn render_csv_index(reports: &[VulnerabilityReport]) -> String {
    let mut out = String::from("id,title,severity,timestamp,cvss,cwe,references,file\n");
    for report in reports {
        let cvss = report
            .cvss_score
            .map(|score| score.to_string())
            .unwrap_or_default();
        let row = [
            report.id.clone(),
            report.title.clone(),
            report.severity.to_uppercase(),
            report.timestamp.clone(),
            cvss,
            report.cwe.join(","),
            report.references.join(","),
            report.detail_file(),
        ];
        let line: Vec<String> = row.iter().map(|field| csv_escape(field)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

#[derive(Serialize)]
struct JsonlRecord<'a> {
    id: &'a str,
    title: &'a str,
    severity: &'a str,
    timestamp: &'a str,
    content: &'a str,
    cvss_score: Option<f64>,
    cwe: &'a [String],
    references: &'a [String],
    fix_recommendation: Option<&'a str>,
    file: String,
    run_id: &'a str,
    run_name: Option<&'a str>,
}

/// Render the consolidated JSONL index, one finding object per line.
pub fn render_jsonl_index(
    reports: &[VulnerabilityReport],
    run_id: &str,
    run_name: Option<&str>,
) -> serde_json::Result<String> {
    let mut out = String::new();
    for report in reports {
        let record = JsonlRecord {
            id: &report.id,
            title: &report.title,
            severity: &report.severity,
            timestamp: &report.timestamp,
            content: &report.content,
            cvss_score: report.cvss_score,
            cwe: &report.cwe,
            references: &report.references,
            fix_recommendation: report.fix_recommendation.as_deref(),
            file: report.detail_file(),
            run_id,
            run_name,
        };
        out.push_str(&serde_json::to_string(&record)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(id: &str, severity: &str, timestamp: &str) -> VulnerabilityReport {
        VulnerabilityReport {
            id: id.to_string(),
            title: format!("Finding {}", id),
            content: "details".to_string(),
            severity: severity.to_string(),
            timestamp: timestamp.to_string(),
            cvss_score: None,
            references: Vec::new(),
            fix_recommendation: None,
            cwe: Vec::new(),
        }
    }

    #[test]
    fn test_sorted_by_severity_then_time() {
        let reports = vec![
            report("vuln-0001", "low", "2026-01-01 10:00:00 UTC"),
            report("vuln-0002", "critical", "2026-01-01 11:00:00 UTC"),
            report("vuln-0003", "critical", "2026-01-01 09:00:00 UTC"),
            report("vuln-0004", "medium", "2026-01-01 08:00:00 UTC"),
        ];

        let sorted = sorted_for_index(&reports);
        let ids: Vec<&str> = sorted.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["vuln-0003", "vuln-0002", "vuln-0004", "vuln-0001"]);
    }

    #[test]
    fn test_unknown_severity_sorts_last() {
        let reports = vec![
            report("vuln-0001", "bizarre", "2026-01-01 10:00:00 UTC"),
            report("vuln-0002", "info", "2026-01-01 10:00:00 UTC"),
        ];
        let sorted = sorted_for_index(&reports);
        assert_eq!(sorted[0].id, "vuln-0002");
        assert_eq!(sorted[1].id, "vuln-0001");
    }

    #[test]
    fn test_markdown_detail_sections() {
        let mut r = report("vuln-0001", "high", "2026-01-01 10:00:00 UTC");
        r.cvss_score = Some(8.1);
        r.cwe = vec!["CWE-89".to_string()];
        r.references = vec!["https://example.com/advisory".to_string()];
        r.fix_recommendation = Some("Parameterize queries".to_string());

        let md = r.render_markdown();
        assert!(md.starts_with("# Finding vuln-0001\n"));
        assert!(md.contains("**Severity:** HIGH"));
        assert!(md.contains("**CVSS:** 8.1"));
        assert!(md.contains("**CWE:** CWE-89"));
        assert!(md.contains("## Description"));
        assert!(md.contains("## Fix Recommendation"));
        assert!(md.contains("- https://example.com/advisory"));
    }

    #[test]
    fn test_csv_index_escaping_and_columns() {
        let mut r = report("vuln-0001", "critical", "2026-01-01 10:00:00 UTC");
        r.title = "SQLi, in \"login\" form".to_string();
        r.cvss_score = Some(9.8);

        let csv = render_csv_index(&[r]);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,title,severity,timestamp,cvss,cwe,references,file"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("\"SQLi, in \"\"login\"\" form\""));
        assert!(row.contains("CRITICAL"));
        assert!(row.contains("9.8"));
        assert!(row.ends_with("vulnerabilities/vuln-0001.md"));
    }

    #[test]
    fn test_csv_empty_cvss_is_blank() {
        let r = report("vuln-0001", "low", "2026-01-01 10:00:00 UTC");
        let csv = render_csv_index(&[r]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains(",LOW,2026-01-01 10:00:00 UTC,,"));
    }

    #[test]
    fn test_jsonl_one_object_per_line() {
        let reports = vec![
            report("vuln-0001", "high", "2026-01-01 10:00:00 UTC"),
            report("vuln-0002", "low", "2026-01-01 11:00:00 UTC"),
        ];
        let jsonl = render_jsonl_index(&reports, "run-1", Some("nightly")).unwrap();
        let lines: Vec<&str> = jsonl.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["id"], "vuln-0001");
        assert_eq!(first["file"], "vulnerabilities/vuln-0001.md");
        assert_eq!(first["run_id"], "run-1");
        assert_eq!(first["run_name"], "nightly");
    }
}
