pub mod schema;

pub use schema::{
    Correction, LimiterConfig, DEFAULT_MAX_CPU_USAGE, DEFAULT_MEASUREMENTS,
    DEFAULT_MEASURE_INTERVAL,
};

use cpulimit_core::{LimitError, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file.  Returns `LimiterConfig::default()` if
/// the file doesn't exist so the limiter always has sensible defaults.
pub fn load(path: impl AsRef<Path>) -> Result<LimiterConfig> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(
            "Config file not found at '{}'; using defaults.",
            path.display()
        );
        return Ok(LimiterConfig::default());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| LimitError::Config(format!("cannot read '{}': {e}", path.display())))?;

    toml::from_str(&raw).map_err(|e| LimitError::Config(format!("TOML parse error: {e}")))
}

/// Return the default config path, honouring `$XDG_CONFIG_HOME`.
pub fn default_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("cpulimit").join("cpulimit.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, LimiterConfig::default());
    }

    #[test]
    fn loads_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpulimit.toml");
        std::fs::write(&path, "measurements = 5\nmeasure_interval_ms = 100\n").unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.measurements, 5);
        assert_eq!(config.measure_interval, Duration::from_millis(100));
        assert_eq!(config.max_cpu_usage, DEFAULT_MAX_CPU_USAGE);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpulimit.toml");
        std::fs::write(&path, "measurements = \"many\"\n").unwrap();

        assert!(matches!(load(&path), Err(LimitError::Config(_))));
    }

    #[test]
    fn default_path_ends_with_crate_dir() {
        assert!(default_path().ends_with("cpulimit/cpulimit.toml"));
    }
}
