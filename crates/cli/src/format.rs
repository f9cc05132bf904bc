//! Report → human/json string formatting.

use stress_harness::HarnessReport;

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Format the final report.
pub fn format_report(report: &HarnessReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(report)
            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)),
        OutputMode::Human => format_human(report),
    }
}

/// Format a fatal error.
pub fn format_error(err: &anyhow::Error, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(&serde_json::json!({
            "error": format!("{:#}", err)
        }))
        .unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", err)),
        OutputMode::Human => format!("(error) {:#}", err),
    }
}

fn format_human(report: &HarnessReport) -> String {
    let mut lines = vec![
        format!("Updated {} entries", report.written),
        format!("Checked {} entries", report.verification.checked),
    ];
    if report.collisions > 0 {
        lines.push(format!("{} key collisions overwritten", report.collisions));
    }
    if report.verification.is_clean() {
        lines.push("(ok) no mismatches".to_string());
    } else {
        lines.push(format!(
            "(error) {} mismatches",
            report.verification.mismatches.len()
        ));
        for mismatch in &report.verification.mismatches {
            lines.push(format!("  {}", mismatch));
        }
    }
    lines.join("\n")
}
