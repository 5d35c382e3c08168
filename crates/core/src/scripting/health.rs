//! Engine availability probe.
//!
//! Runs the engine's version query under a short timeout. Never fails: any
//! problem is reported as "unavailable". Results are not cached because the
//! engine installation can change between calls.

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use regex::Regex;
use serde::Serialize;
use tokio::process::Command;
use tokio::sync::Mutex;

use super::engine::EngineConfig;
use super::subprocess::{self, RunLimits};

/// Output cap for the version query; banners are small.
const PROBE_MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Grace period after SIGTERM for a hung version query.
const PROBE_KILL_GRACE: Duration = Duration::from_millis(500);

/// First dotted version number, e.g. `3.7.1` or `2.5.0.6248`.
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.\d+(?:\.\d+)*)").expect("valid regex"));

/// Whether the engine can be started, and what version it reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineAvailability {
    pub available: bool,
    /// `Some` only when available; empty if no version could be parsed.
    pub version: Option<String>,
    /// Why the engine is considered unavailable.
    pub reason: Option<String>,
}

impl EngineAvailability {
    fn available(version: String) -> Self {
        Self {
            available: true,
            version: Some(version),
            reason: None,
        }
    }

    fn unavailable(reason: String) -> Self {
        Self {
            available: false,
            version: None,
            reason: Some(reason),
        }
    }
}

/// Runs the engine's version query on demand.
///
/// At most one query runs at a time per prober (clones share the slot).
/// Callers that arrive while a query is in flight wait for it and take its
/// result; a caller that arrives after a query finished always gets a fresh
/// one.
#[derive(Debug, Clone)]
pub struct HealthProber {
    program: PathBuf,
    version_args: Vec<String>,
    timeout: Duration,
    last: Arc<Mutex<Option<(Instant, EngineAvailability)>>>,
}

impl HealthProber {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            program: config.program.clone(),
            version_args: config.version_args.clone(),
            timeout: config.probe_timeout,
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn probe(&self) -> EngineAvailability {
        let requested = Instant::now();
        let mut last = self.last.lock().await;
        if let Some((finished, availability)) = last.as_ref() {
            if *finished >= requested {
                return availability.clone();
            }
        }

        let availability = self.query().await;
        *last = Some((Instant::now(), availability.clone()));
        availability
    }

    async fn query(&self) -> EngineAvailability {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.version_args);
        // Some interpreters write scratch files; keep them out of the
        // server's working directory.
        cmd.current_dir(std::env::temp_dir());

        let limits = RunLimits {
            timeout: self.timeout,
            kill_grace: PROBE_KILL_GRACE,
            max_output_bytes: PROBE_MAX_OUTPUT_BYTES,
        };

        let availability = match subprocess::run_command(&mut cmd, limits).await {
            Ok(outcome) if outcome.success => {
                let version = parse_version(&outcome.stdout)
                    .or_else(|| parse_version(&outcome.stderr))
                    .unwrap_or_default();
                EngineAvailability::available(version)
            }
            Ok(outcome) if outcome.timed_out => EngineAvailability::unavailable(format!(
                "version query timed out after {}ms",
                self.timeout.as_millis()
            )),
            Ok(outcome) => EngineAvailability::unavailable(format!(
                "version query exited with code {}",
                outcome.exit_code
            )),
            Err(e) => EngineAvailability::unavailable(e.to_string()),
        };

        if availability.available {
            tracing::debug!(version = ?availability.version, "Engine probe succeeded");
        } else {
            tracing::warn!(
                program = %self.program.display(),
                reason = ?availability.reason,
                "Engine probe failed"
            );
        }
        availability
    }
}

/// Extract the first dotted version number (`3.7.1`, `2.5.0.6248`) from
/// engine output.
pub fn parse_version(text: &str) -> Option<String> {
    VERSION_RE.captures(text).map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_prober(version_script: &str) -> HealthProber {
        HealthProber::new(&EngineConfig {
            program: "sh".into(),
            version_args: vec!["-c".to_string(), version_script.to_string()],
            probe_timeout: Duration::from_millis(500),
            ..EngineConfig::default()
        })
    }

    #[test]
    fn test_parse_version_from_banner() {
        let banner = "OpenSees -- Open System For Earthquake Engineering Simulation\n\
                      Pacific Earthquake Engineering Research Center\n\
                      Version 3.7.1 64-Bit";
        assert_eq!(parse_version(banner).as_deref(), Some("3.7.1"));
    }

    #[test]
    fn test_parse_version_takes_first_match() {
        assert_eq!(parse_version("v2.5.0.6248 (rev 1.2)").as_deref(), Some("2.5.0.6248"));
    }

    #[test]
    fn test_parse_version_none() {
        assert_eq!(parse_version("OpenSees"), None);
        assert_eq!(parse_version(""), None);
    }

    #[tokio::test]
    async fn test_probe_available_with_version() {
        let availability = sh_prober("echo 'OpenSees 3.7.1'").probe().await;
        assert!(availability.available);
        assert_eq!(availability.version.as_deref(), Some("3.7.1"));
        assert!(availability.reason.is_none());
    }

    #[tokio::test]
    async fn test_probe_reads_version_from_stderr() {
        let availability = sh_prober("echo 'Version 3.6.0' >&2").probe().await;
        assert_eq!(availability.version.as_deref(), Some("3.6.0"));
    }

    #[tokio::test]
    async fn test_probe_available_without_version() {
        let availability = sh_prober("echo ready").probe().await;
        assert!(availability.available);
        assert_eq!(availability.version.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_probe_nonzero_exit_is_unavailable() {
        let availability = sh_prober("echo 3.7.1; exit 2").probe().await;
        assert!(!availability.available);
        assert!(availability.version.is_none());
        assert!(availability.reason.is_some_and(|r| r.contains("code 2")));
    }

    #[tokio::test]
    async fn test_probe_timeout_is_unavailable() {
        let availability = sh_prober("sleep 30").probe().await;
        assert!(!availability.available);
        assert!(availability.reason.is_some_and(|r| r.contains("timed out")));
    }

    #[tokio::test]
    async fn test_concurrent_probes_share_one_query() {
        let dir = tempfile::tempdir().expect("dir");
        let counter = dir.path().join("count");
        let prober = sh_prober(&format!(
            "echo x >> '{}'; sleep 0.2; echo 'OpenSees 3.7.1'",
            counter.display()
        ));
        let other = prober.clone();

        let (a, b, c, d) = tokio::join!(prober.probe(), other.probe(), prober.probe(), other.probe());

        for availability in [a, b, c, d] {
            assert_eq!(availability.version.as_deref(), Some("3.7.1"));
        }
        let runs = std::fs::read_to_string(&counter).expect("count").lines().count();
        assert_eq!(runs, 1);
    }

    #[tokio::test]
    async fn test_sequential_probes_are_not_cached() {
        let dir = tempfile::tempdir().expect("dir");
        let counter = dir.path().join("count");
        let prober = sh_prober(&format!("echo x >> '{}'; echo 3.7.1", counter.display()));

        prober.probe().await;
        prober.probe().await;

        let runs = std::fs::read_to_string(&counter).expect("count").lines().count();
        assert_eq!(runs, 2);
    }

    #[tokio::test]
    async fn test_probe_missing_binary_is_unavailable() {
        let prober = HealthProber::new(&EngineConfig {
            program: "/nonexistent/OpenSees".into(),
            ..EngineConfig::default()
        });
        let availability = prober.probe().await;
        assert!(!availability.available);
        assert!(availability.version.is_none());
    }
}
