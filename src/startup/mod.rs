//! Self-checks run before the server starts accepting requests.
//!
//! Critical failures (no database, broken schema, unusable data directory)
//! abort startup. Advisory failures (no admin yet, SMTP unset, missing
//! static assets) are logged and the server boots anyway.

use std::path::Path;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::DbPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Failure aborts startup
    Critical,
    /// Failure is logged as a warning
    Advisory,
}

/// Outcome of one self-check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub severity: Severity,
    pub passed: bool,
    pub message: String,
    pub detail: Option<String>,
}

impl CheckResult {
    fn passed(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            severity: Severity::Advisory,
            passed: true,
            message: message.into(),
            detail: None,
        }
    }

    fn failed(name: &'static str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            name,
            severity,
            passed: false,
            message: message.into(),
            detail: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug)]
pub struct StartupCheckReport {
    pub checks: Vec<CheckResult>,
}

impl StartupCheckReport {
    pub fn all_critical_passed(&self) -> bool {
        self.checks
            .iter()
            .all(|c| c.passed || c.severity != Severity::Critical)
    }

    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn summary(&self) -> String {
        let total = self.checks.len();
        let passed = self.checks.iter().filter(|c| c.passed).count();

        if passed == total {
            return format!("all {} startup checks passed", total);
        }

        let critical = self
            .checks
            .iter()
            .filter(|c| !c.passed && c.severity == Severity::Critical)
            .count();
        if critical > 0 {
            format!("{}/{} checks passed, {} critical failures", passed, total, critical)
        } else {
            format!("{}/{} checks passed, rest are warnings", passed, total)
        }
    }
}

/// Run every self-check and log each outcome.
pub async fn run_startup_checks(config: &Config, db: &DbPool) -> StartupCheckReport {
    info!("Running startup self-checks");

    let checks = vec![
        check_database_connectivity(db).await,
        check_database_schema(db).await,
        check_admin_account(db).await,
        check_data_directory(&config.server.data_dir),
        check_static_assets(&config.server.static_dir),
        check_email_configuration(config),
    ];

    for check in &checks {
        match (check.passed, check.severity) {
            (true, _) => info!(check = check.name, "{}", check.message),
            (false, Severity::Critical) => {
                error!(check = check.name, detail = ?check.detail, "{}", check.message)
            }
            (false, Severity::Advisory) => {
                warn!(check = check.name, detail = ?check.detail, "{}", check.message)
            }
        }
    }

    let report = StartupCheckReport { checks };
    info!(
        all_passed = report.all_passed(),
        "Startup checks completed: {}",
        report.summary()
    );
    report
}

async fn check_database_connectivity(db: &DbPool) -> CheckResult {
    match sqlx::query("SELECT 1").fetch_one(db).await {
        Ok(_) => CheckResult::passed("database_connectivity", "Database reachable"),
        Err(e) => CheckResult::failed(
            "database_connectivity",
            Severity::Critical,
            "Cannot reach the database",
        )
        .with_detail(e.to_string()),
    }
}

/// Every table the handlers touch must exist after migrations ran.
async fn check_database_schema(db: &DbPool) -> CheckResult {
    let tables: Result<Vec<(String,)>, _> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_all(db)
    .await;

    let tables = match tables {
        Ok(rows) => rows.into_iter().map(|(name,)| name).collect::<Vec<_>>(),
        Err(e) => {
            return CheckResult::failed(
                "database_schema",
                Severity::Critical,
                "Cannot inspect the database schema",
            )
            .with_detail(e.to_string())
        }
    };

    let required = [
        "leads",
        "reviews",
        "students",
        "instructors",
        "vehicles",
        "lessons",
        "site_profile",
        "users",
        "user_roles",
        "sessions",
        "audit_logs",
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|name| !tables.iter().any(|t| t == *name))
        .copied()
        .collect();

    if missing.is_empty() {
        CheckResult::passed(
            "database_schema",
            format!("Schema complete ({} tables)", tables.len()),
        )
    } else {
        CheckResult::failed("database_schema", Severity::Critical, "Schema is missing tables")
            .with_detail(format!("missing: {}", missing.join(", ")))
    }
}

async fn check_admin_account(db: &DbPool) -> CheckResult {
    let count: Result<(i64,), _> =
        sqlx::query_as("SELECT COUNT(DISTINCT user_id) FROM user_roles WHERE role = 'admin'")
            .fetch_one(db)
            .await;

    match count {
        Ok((n,)) if n > 0 => {
            CheckResult::passed("admin_account", format!("{} admin account(s) present", n))
        }
        Ok(_) => CheckResult::failed(
            "admin_account",
            Severity::Advisory,
            "No admin account exists yet",
        )
        .with_detail("Complete first-run setup via POST /api/auth/setup"),
        Err(e) => CheckResult::failed(
            "admin_account",
            Severity::Advisory,
            "Cannot count admin accounts",
        )
        .with_detail(e.to_string()),
    }
}

/// The data directory must exist and accept writes, or the database and
/// anything else we persist is dead on arrival.
fn check_data_directory(data_dir: &Path) -> CheckResult {
    if !data_dir.is_dir() {
        return CheckResult::failed(
            "data_directory",
            Severity::Critical,
            "Data directory does not exist",
        )
        .with_detail(data_dir.display().to_string());
    }

    let probe = data_dir.join(".drivedesk_write_test");
    match std::fs::write(&probe, b"probe") {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            CheckResult::passed(
                "data_directory",
                format!("Data directory writable ({})", data_dir.display()),
            )
        }
        Err(e) => CheckResult::failed(
            "data_directory",
            Severity::Critical,
            "Data directory is not writable",
        )
        .with_detail(format!("{}: {}", data_dir.display(), e)),
    }
}

fn check_static_assets(static_dir: &Path) -> CheckResult {
    if static_dir.is_dir() {
        CheckResult::passed(
            "static_assets",
            format!("Static assets found ({})", static_dir.display()),
        )
    } else {
        CheckResult::failed(
            "static_assets",
            Severity::Advisory,
            "Static assets directory not found, frontend will not be served",
        )
        .with_detail(static_dir.display().to_string())
    }
}

fn check_email_configuration(config: &Config) -> CheckResult {
    if config.email.is_configured() && config.email.notify_address.is_some() {
        let to = config.email.notify_address.as_deref().unwrap_or_default();
        CheckResult::passed(
            "email_configuration",
            format!("Lead notifications go to {}", to),
        )
    } else {
        CheckResult::failed(
            "email_configuration",
            Severity::Advisory,
            "Lead notifications disabled",
        )
        .with_detail("Set smtp_host, from_address and notify_address in the [email] section")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn passing(name: &'static str) -> CheckResult {
        CheckResult::passed(name, "ok")
    }

    #[test]
    fn test_report_with_all_passing() {
        let report = StartupCheckReport {
            checks: vec![passing("a"), passing("b")],
        };
        assert!(report.all_passed());
        assert!(report.all_critical_passed());
        assert_eq!(report.summary(), "all 2 startup checks passed");
    }

    #[test]
    fn test_critical_failure_fails_report() {
        let report = StartupCheckReport {
            checks: vec![
                passing("a"),
                CheckResult::failed("b", Severity::Critical, "broken"),
            ],
        };
        assert!(!report.all_critical_passed());
        assert!(report.summary().contains("1 critical failure"));
    }

    #[test]
    fn test_advisory_failure_still_boots() {
        let report = StartupCheckReport {
            checks: vec![
                passing("a"),
                CheckResult::failed("b", Severity::Advisory, "unset"),
            ],
        };
        assert!(report.all_critical_passed());
        assert!(!report.all_passed());
        assert!(report.summary().contains("warnings"));
    }

    #[test]
    fn test_missing_static_dir_is_advisory() {
        let result = check_static_assets(&PathBuf::from("/nonexistent/drivedesk-static"));
        assert!(!result.passed);
        assert_eq!(result.severity, Severity::Advisory);
    }

    #[test]
    fn test_missing_data_dir_is_critical() {
        let result = check_data_directory(&PathBuf::from("/nonexistent/drivedesk-data"));
        assert!(!result.passed);
        assert_eq!(result.severity, Severity::Critical);
    }

    #[test]
    fn test_email_check_follows_configuration() {
        let mut config = Config::default();
        let result = check_email_configuration(&config);
        assert!(!result.passed);
        assert_eq!(result.severity, Severity::Advisory);

        config.email.smtp_host = Some("smtp.example.com".to_string());
        config.email.from_address = Some("noreply@example.com".to_string());
        config.email.notify_address = Some("instructor@example.com".to_string());
        assert!(check_email_configuration(&config).passed);
    }
}
