// src/recording/sarif.rs
//! SARIF 2.1.0 export
//!
//! Maps the consolidated finding index into a SARIF document for external
//! code-review and CI tooling: one rule per severity level, one result per
//! finding. Unknown severities fall back to the medium rule but keep their
//! recorded severity string in the result properties.

use crate::recording::report::VulnerabilityReport;
use serde::Serialize;

const SARIF_SCHEMA: &str = "https://json.schemastore.org/sarif-2.1.0.json";
const SARIF_VERSION: &str = "2.1.0";
const TOOL_NAME: &str = "Talon";

/// Top-level SARIF document
#[derive(Debug, Serialize)]
pub struct SarifDocument {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub version: String,
    pub runs: Vec<SarifRun>,
}

#[derive(Debug, Serialize)]
pub struct SarifRun {
    pub tool: SarifTool,
    pub results: Vec<SarifResult>,
}

#[derive(Debug, Serialize)]
pub struct SarifTool {
    pub driver: SarifDriver,
}

#[derive(Debug, Serialize)]
pub struct SarifDriver {
    pub name: String,
    pub rules: Vec<SarifRule>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifRule {
    pub id: String,
    pub name: String,
    pub short_description: SarifText,
    pub default_configuration: SarifLevel,
}

#[derive(Debug, Serialize)]
pub struct SarifText {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SarifLevel {
    pub level: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifResult {
    pub rule_id: String,
    pub level: String,
    pub message: SarifText,
    pub locations: Vec<SarifLocation>,
    pub properties: SarifProperties,
    pub partial_fingerprints: SarifFingerprints,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifLocation {
    pub physical_location: SarifPhysicalLocation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifPhysicalLocation {
    pub artifact_location: SarifArtifactLocation,
}

#[derive(Debug, Serialize)]
pub struct SarifArtifactLocation {
    pub uri: String,
}

#[derive(Debug, Serialize)]
pub struct SarifProperties {
    pub id: String,
    pub severity: String,
    pub timestamp: String,
    pub content: String,
    pub cvss_score: Option<f64>,
    pub cwe: Vec<String>,
    pub references: Vec<String>,
    pub fix_recommendation: Option<String>,
    #[serde(rename = "runId")]
    pub run_id: String,
    #[serde(rename = "runName")]
    pub run_name: String,
}

#[derive(Debug, Serialize)]
pub struct SarifFingerprints {
    #[serde(rename = "talon/vulnerabilityId")]
    pub vulnerability_id: String,
}

struct SeverityRule {
    key: &'static str,
    rule_id: &'static str,
    level: &'static str,
    name: &'static str,
}

const SEVERITY_RULES: [SeverityRule; 5] = [
    SeverityRule {
        key: "critical",
        rule_id: "TALON.CRITICAL",
        level: "error",
        name: "Critical",
    },
    SeverityRule {
        key: "high",
        rule_id: "TALON.HIGH",
        level: "error",
        name: "High",
    },
    SeverityRule {
        key: "medium",
        rule_id: "TALON.MEDIUM",
        level: "warning",
        name: "Medium",
    },
    SeverityRule {
        key: "low",
        rule_id: "TALON.LOW",
        level: "note",
        name: "Low",
    },
    SeverityRule {
        key: "info",
        rule_id: "TALON.INFO",
        level: "note",
        name: "Informational",
    },
];

fn rule_for(severity: &str) -> &'static SeverityRule {
    SEVERITY_RULES
        .iter()
        .find(|rule| rule.key == severity)
        .unwrap_or(&SEVERITY_RULES[2])
}

/// Build a SARIF document from reports already sorted for the index.
pub fn build_sarif(
    reports: &[VulnerabilityReport],
    run_id: &str,
    run_name: Option<&str>,
) -> SarifDocument {
    let rules = SEVERITY_RULES
        .iter()
        .map(|rule| SarifRule {
            id: rule.rule_id.to_string(),
            name: format!("{} Severity", rule.name),
            short_description: SarifText {
                text: format!("{} severity vulnerability", rule.name),
            },
            default_configuration: SarifLevel {
                level: rule.level.to_string(),
            },
        })
        .collect();

    let results = reports
        .iter()
        .map(|report| {
            let rule = rule_for(&report.severity);
            SarifResult {
                rule_id: rule.rule_id.to_string(),
                level: rule.level.to_string(),
                message: SarifText {
                    text: report.title.clone(),
                },
                locations: vec![SarifLocation {
                    physical_location: SarifPhysicalLocation {
                        artifact_location: SarifArtifactLocation {
                            uri: report.detail_file(),
                        },
                    },
                }],
                properties: SarifProperties {
                    id: report.id.clone(),
                    severity: report.severity.clone(),
                    timestamp: report.timestamp.clone(),
                    content: report.content.clone(),
                    cvss_score: report.cvss_score,
                    cwe: report.cwe.clone(),
                    references: report.references.clone(),
                    fix_recommendation: report.fix_recommendation.clone(),
                    run_id: run_id.to_string(),
                    run_name: run_name.unwrap_or_default().to_string(),
                },
                partial_fingerprints: SarifFingerprints {
                    vulnerability_id: report.id.clone(),
                },
            }
        })
        .collect();

    SarifDocument {
        schema: SARIF_SCHEMA.to_string(),
        version: SARIF_VERSION.to_string(),
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: TOOL_NAME.to_string(),
                    rules,
                },
            },
            results,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(id: &str, severity: &str) -> VulnerabilityReport {
        VulnerabilityReport {
            id: id.to_string(),
            title: format!("Finding {}", id),
            content: "details".to_string(),
            severity: severity.to_string(),
            timestamp: "2026-01-01 10:00:00 UTC".to_string(),
            cvss_score: Some(7.5),
            references: vec!["https://example.com".to_string()],
            fix_recommendation: None,
            cwe: vec!["CWE-79".to_string()],
        }
    }

    #[test]
    fn test_document_shape() {
        let doc = build_sarif(&[report("vuln-0001", "critical")], "run-1", Some("nightly"));
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["$schema"], SARIF_SCHEMA);
        assert_eq!(value["version"], "2.1.0");
        assert_eq!(value["runs"][0]["tool"]["driver"]["name"], "Talon");
        assert_eq!(
            value["runs"][0]["tool"]["driver"]["rules"]
                .as_array()
                .unwrap()
                .len(),
            5
        );

        let result = &value["runs"][0]["results"][0];
        assert_eq!(result["ruleId"], "TALON.CRITICAL");
        assert_eq!(result["level"], "error");
        assert_eq!(
            result["locations"][0]["physicalLocation"]["artifactLocation"]["uri"],
            "vulnerabilities/vuln-0001.md"
        );
        assert_eq!(result["properties"]["runId"], "run-1");
        assert_eq!(
            result["partialFingerprints"]["talon/vulnerabilityId"],
            "vuln-0001"
        );
    }

    #[test]
    fn test_unknown_severity_maps_to_medium_rule() {
        let doc = build_sarif(&[report("vuln-0001", "weird")], "run-1", None);
        let value = serde_json::to_value(&doc).unwrap();
        let result = &value["runs"][0]["results"][0];

        assert_eq!(result["ruleId"], "TALON.MEDIUM");
        assert_eq!(result["level"], "warning");
        // The recorded severity string survives in properties.
        assert_eq!(result["properties"]["severity"], "weird");
    }

    #[test]
    fn test_one_result_per_finding() {
        let reports = vec![
            report("vuln-0001", "high"),
            report("vuln-0002", "low"),
            report("vuln-0003", "info"),
        ];
        let doc = build_sarif(&reports, "run-1", None);
        assert_eq!(doc.runs[0].results.len(), 3);
    }
}
