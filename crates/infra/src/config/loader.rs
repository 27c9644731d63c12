//! Configuration loader
//!
//! Loads the session core configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. If `NEWSLINE_BACKEND_HOST` is set, configuration comes from the
//!    environment (unset optional variables keep their defaults)
//! 2. Otherwise the first config file found by [`probe_config_paths`] is used
//! 3. With neither, [`Config::default`] applies
//!
//! ## Environment Variables
//! - `NEWSLINE_BACKEND_HOST`: Backend base URL (required for env loading)
//! - `NEWSLINE_REQUEST_TIMEOUT_SECS`: Per-request timeout in seconds
//! - `NEWSLINE_TRANSPORT_ATTEMPTS`: Total transport attempts per request
//! - `NEWSLINE_REFRESH_BINDING`: `body` or `bearer`
//! - `NEWSLINE_STORE_PATH`: Session store file
//! - `NEWSLINE_LOG_LEVEL`: Default log filter when `RUST_LOG` is unset
//! - `NEWSLINE_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.{json,toml}` then `./newsline.{json,toml}`
//! 2. `../` and `../../` (config files only)
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use newsline_domain::{Config, NewslineError, RefreshBinding, Result};

pub const BACKEND_HOST_VAR: &str = "NEWSLINE_BACKEND_HOST";

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `NewslineError::Config` if the environment is selected but
/// holds an invalid value, or a config file exists but cannot be parsed.
pub fn load() -> Result<Config> {
    if std::env::var_os(BACKEND_HOST_VAR).is_some() {
        let config = load_from_env()?;
        tracing::info!("Configuration loaded from environment variables");
        return Ok(config);
    }

    match probe_config_paths() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::debug!("No config file found; using defaults");
            Ok(Config::default())
        }
    }
}

/// Load configuration from environment variables
///
/// `NEWSLINE_BACKEND_HOST` is required; every other variable is optional.
///
/// # Errors
/// Returns `NewslineError::Config` if the host is missing or a value does
/// not parse.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.backend.base_url = env_var(BACKEND_HOST_VAR)?;
    if let Some(timeout) = env_parse::<u64>("NEWSLINE_REQUEST_TIMEOUT_SECS")? {
        config.backend.request_timeout_secs = timeout;
    }
    if let Some(attempts) = env_parse::<usize>("NEWSLINE_TRANSPORT_ATTEMPTS")? {
        config.backend.transport_attempts = attempts;
    }
    if let Some(binding) = env_parse::<RefreshBinding>("NEWSLINE_REFRESH_BINDING")? {
        config.auth.refresh_binding = binding;
    }
    if let Ok(path) = std::env::var("NEWSLINE_STORE_PATH") {
        config.storage.path = path;
    }
    if let Ok(level) = std::env::var("NEWSLINE_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("NEWSLINE_LOG_JSON", config.logging.json);

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `NewslineError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(NewslineError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            NewslineError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| NewslineError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| NewslineError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| NewslineError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(NewslineError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("newsline.json"),
        dir.join("newsline.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        NewslineError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Parse an optional environment variable
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| NewslineError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const VARS: [&str; 7] = [
        "NEWSLINE_BACKEND_HOST",
        "NEWSLINE_REQUEST_TIMEOUT_SECS",
        "NEWSLINE_TRANSPORT_ATTEMPTS",
        "NEWSLINE_REFRESH_BINDING",
        "NEWSLINE_STORE_PATH",
        "NEWSLINE_LOG_LEVEL",
        "NEWSLINE_LOG_JSON",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    fn write_with_extension(contents: &str, extension: &str) -> PathBuf {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        let path = temp_file.path().with_extension(extension);
        std::fs::copy(temp_file.path(), &path).unwrap();
        path
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("NEWSLINE_TEST_BOOL_ON", "on");
        std::env::set_var("NEWSLINE_TEST_BOOL_UPPER", "TRUE");
        std::env::set_var("NEWSLINE_TEST_BOOL_OFF", "off");
        std::env::remove_var("NEWSLINE_TEST_BOOL_MISSING");

        assert!(env_bool("NEWSLINE_TEST_BOOL_ON", false));
        assert!(env_bool("NEWSLINE_TEST_BOOL_UPPER", false));
        assert!(!env_bool("NEWSLINE_TEST_BOOL_OFF", true));
        assert!(env_bool("NEWSLINE_TEST_BOOL_MISSING", true));

        std::env::remove_var("NEWSLINE_TEST_BOOL_ON");
        std::env::remove_var("NEWSLINE_TEST_BOOL_UPPER");
        std::env::remove_var("NEWSLINE_TEST_BOOL_OFF");
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("NEWSLINE_BACKEND_HOST", "https://api.newsline.test");
        std::env::set_var("NEWSLINE_REQUEST_TIMEOUT_SECS", "12");
        std::env::set_var("NEWSLINE_TRANSPORT_ATTEMPTS", "3");
        std::env::set_var("NEWSLINE_REFRESH_BINDING", "bearer");
        std::env::set_var("NEWSLINE_STORE_PATH", "/tmp/session.json");
        std::env::set_var("NEWSLINE_LOG_LEVEL", "debug");
        std::env::set_var("NEWSLINE_LOG_JSON", "yes");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        assert_eq!(config.backend.base_url, "https://api.newsline.test");
        assert_eq!(config.backend.request_timeout_secs, 12);
        assert_eq!(config.backend.transport_attempts, 3);
        assert_eq!(config.auth.refresh_binding, RefreshBinding::Bearer);
        assert_eq!(config.storage.path, "/tmp/session.json");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_from_env_keeps_defaults_for_optional_vars() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("NEWSLINE_BACKEND_HOST", "http://localhost:8080");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        assert_eq!(config.backend.base_url, "http://localhost:8080");
        assert_eq!(config.backend.request_timeout_secs, 30);
        assert_eq!(config.auth.refresh_binding, RefreshBinding::Body);
    }

    #[test]
    fn test_load_from_env_missing_host() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, NewslineError::Config(_)), "Should be a Config error");
    }

    #[test]
    fn test_load_from_env_invalid_values() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("NEWSLINE_BACKEND_HOST", "http://localhost:8080");
        std::env::set_var("NEWSLINE_REQUEST_TIMEOUT_SECS", "soon");

        let timeout_result = load_from_env();

        std::env::set_var("NEWSLINE_REQUEST_TIMEOUT_SECS", "10");
        std::env::set_var("NEWSLINE_REFRESH_BINDING", "cookie");
        let binding_result = load_from_env();
        clear_env();

        assert!(matches!(timeout_result, Err(NewslineError::Config(_))));
        assert!(matches!(binding_result, Err(NewslineError::Config(_))));
    }

    #[test]
    fn test_load_prefers_environment() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("NEWSLINE_BACKEND_HOST", "https://env.newsline.test");

        let result = load();
        clear_env();

        assert_eq!(result.unwrap().backend.base_url, "https://env.newsline.test");
    }

    #[test]
    fn test_load_from_file_json() {
        let path = write_with_extension(
            r#"{
                "backend": { "base_url": "https://json.newsline.test", "request_timeout_secs": 5 },
                "auth": { "refresh_binding": "bearer" }
            }"#,
            "json",
        );

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        let config = result.expect("config from JSON file");
        assert_eq!(config.backend.base_url, "https://json.newsline.test");
        assert_eq!(config.backend.request_timeout_secs, 5);
        assert_eq!(config.backend.transport_attempts, 1);
        assert_eq!(config.auth.refresh_binding, RefreshBinding::Bearer);
    }

    #[test]
    fn test_load_from_file_toml() {
        let path = write_with_extension(
            r#"
[storage]
path = "session.json"

[logging]
level = "warn"
json = true
"#,
            "toml",
        );

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        let config = result.expect("config from TOML file");
        assert_eq!(config.storage.path, "session.json");
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.json);
        assert_eq!(config.backend.base_url, Config::default().backend.base_url);
    }

    #[test]
    fn test_load_from_file_not_found() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/config.json"))).unwrap_err();
        assert!(matches!(err, NewslineError::Config(_)), "Should be a Config error");
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let path = write_with_extension(r#"{ "backend": "#, "json");

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        assert!(result.is_err(), "Should fail with invalid JSON");
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", &PathBuf::from("test.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }
}
