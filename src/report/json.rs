use anyhow::Result;
use crate::report::finding::AlertReport;

/// Render an alert report as pretty-printed JSON
pub fn render(report: &AlertReport) -> Result<String> {
    let json = serde_json::to_string_pretty(report)?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::finding::AlertSummary;

    #[test]
    fn test_render_empty_report() {
        let report = AlertReport {
            version: "0.2.0".to_string(),
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            repository: "octocat/example-repo".to_string(),
            source: "rest".to_string(),
            alerts: 0,
            findings: Vec::new(),
            summary: AlertSummary::default(),
        };
        let json = render(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["repository"], "octocat/example-repo");
        assert_eq!(value["summary"]["total"], 0);
        assert!(value["findings"].as_array().unwrap().is_empty());
    }
}
