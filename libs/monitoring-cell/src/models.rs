use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Body of `GET /health`. Each dependency reports `"ok"` or `"error: …"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checks: BTreeMap<String, String>,
}

impl HealthReport {
    pub fn from_checks(checks: BTreeMap<String, String>) -> Self {
        let status = if checks.values().all(|outcome| outcome == "ok") {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        Self { status, checks }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_failing_check_marks_the_service_unhealthy() {
        let mut checks = BTreeMap::new();
        checks.insert("database".to_string(), "ok".to_string());
        assert!(HealthReport::from_checks(checks.clone()).is_healthy());

        checks.insert("storage".to_string(), "error: timeout".to_string());
        let report = HealthReport::from_checks(checks);
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }
}
