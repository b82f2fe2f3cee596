use std::path::Path;

use crate::error::{EngineError, Result};
use crate::models::ExecutionReport;
use crate::wal::atomic_write;

/// Save an execution report as pretty JSON
pub fn save_report(path: &Path, report: &ExecutionReport) -> Result<()> {
    let json = serde_json::to_vec_pretty(report)
        .map_err(EngineError::encode("report"))?;
    atomic_write(path, &json)?;
    tracing::info!(path = %path.display(), "Saved execution report");
    Ok(())
}

pub fn load_report(path: &Path) -> Result<ExecutionReport> {
    let text = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| EngineError::PlanParse(format!("Invalid report: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_report_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");

        let mut report = ExecutionReport::new("/mnt/hdd".to_string(), false);
        report.moves_planned = 3;
        report.moves_executed = 2;
        report.moves_failed = 1;
        save_report(&path, &report).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"executed_at\""));

        let loaded = load_report(&path).unwrap();
        assert_eq!(loaded.moves_executed, 2);
        assert_eq!(loaded.executed_at, report.executed_at);
        assert!(!loaded.success());
    }
}
