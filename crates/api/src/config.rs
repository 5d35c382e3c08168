use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use opensees_core::scripting::engine::EngineConfig;

/// Slack added on top of the engine timeout and kill grace to get the
/// overall request timeout.
const REQUEST_OVERHEAD_SECS: u64 = 5;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds. Defaults to the engine timeout plus
    /// kill grace plus a few seconds of overhead.
    pub request_timeout_secs: u64,
    /// Maximum accepted request body (uploads and JSON scripts).
    pub max_upload_bytes: usize,
    /// Maximum number of engine processes running at once.
    pub max_concurrent_jobs: usize,
    /// Directory under which per-job workspaces are created.
    pub workspace_root: PathBuf,
    /// Probe the engine before accepting each job.
    pub require_engine_probe: bool,
    /// How to launch the OpenSees engine.
    pub engine: EngineConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                              |
    /// |-----------------------------|--------------------------------------|
    /// | `HOST`                      | `0.0.0.0`                            |
    /// | `PORT`                      | `8000`                               |
    /// | `CORS_ORIGINS`              | `http://localhost:3000`              |
    /// | `OPENSEES_BIN`              | `OpenSees`                           |
    /// | `OPENSEES_VERSION_ARGS`     | `--version`                          |
    /// | `ENGINE_TIMEOUT_SECS`       | `60`                                 |
    /// | `ENGINE_KILL_GRACE_MS`      | `1000`                               |
    /// | `HEALTH_PROBE_TIMEOUT_SECS` | `5`                                  |
    /// | `MAX_OUTPUT_BYTES`          | `10485760`                           |
    /// | `MAX_CONCURRENT_JOBS`       | `4`                                  |
    /// | `MAX_UPLOAD_BYTES`          | `5242880`                            |
    /// | `WORKSPACE_ROOT`            | OS temp dir                          |
    /// | `REQUIRE_ENGINE_PROBE`      | `false`                              |
    /// | `REQUEST_TIMEOUT_SECS`      | engine timeout + grace + 5s          |
    ///
    /// Panics on malformed values; misconfiguration should fail at startup.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&lookup, "PORT", 8000);

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            program: lookup("OPENSEES_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.program),
            version_args: lookup("OPENSEES_VERSION_ARGS")
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or(defaults.version_args),
            timeout: Duration::from_secs(parse_or(
                &lookup,
                "ENGINE_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )),
            kill_grace: Duration::from_millis(parse_or(
                &lookup,
                "ENGINE_KILL_GRACE_MS",
                defaults.kill_grace.as_millis() as u64,
            )),
            probe_timeout: Duration::from_secs(parse_or(
                &lookup,
                "HEALTH_PROBE_TIMEOUT_SECS",
                defaults.probe_timeout.as_secs(),
            )),
            max_output_bytes: parse_or(&lookup, "MAX_OUTPUT_BYTES", defaults.max_output_bytes),
        };

        let request_timeout_secs: u64 = parse_or(
            &lookup,
            "REQUEST_TIMEOUT_SECS",
            default_request_timeout_secs(&engine),
        );

        let max_concurrent_jobs: usize = parse_or(&lookup, "MAX_CONCURRENT_JOBS", 4);
        assert!(max_concurrent_jobs > 0, "MAX_CONCURRENT_JOBS must be at least 1");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 5 * 1024 * 1024),
            max_concurrent_jobs,
            workspace_root: lookup("WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            require_engine_probe: parse_or(&lookup, "REQUIRE_ENGINE_PROBE", false),
            engine,
        }
    }
}

/// Engine timeout + kill grace + [`REQUEST_OVERHEAD_SECS`], rounded up.
pub fn default_request_timeout_secs(engine: &EngineConfig) -> u64 {
    let bound = engine.timeout + engine.kill_grace;
    bound.as_secs() + u64::from(bound.subsec_nanos() > 0) + REQUEST_OVERHEAD_SECS
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>())),
        None => default,
    }
}
