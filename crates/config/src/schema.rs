use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Ceiling applied when `max_cpu_usage` is unset, in percent.
pub const DEFAULT_MAX_CPU_USAGE: f64 = 80.0;
/// Tick period applied when `measure_interval` is unset.
pub const DEFAULT_MEASURE_INTERVAL: Duration = Duration::from_millis(333);
/// Window size applied when `measurements` is unset.
pub const DEFAULT_MEASUREMENTS: usize = 3;

/// Limiter configuration, parsed from `cpulimit.toml` or built in code.
///
/// Zero values mean "unset" and are replaced by [`LimiterConfig::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Ceiling for the rolling mean, in percent (0 – 100). Callers of `wait()`
    /// block while the mean is strictly above it.
    pub max_cpu_usage: f64,
    /// How often CPU counters are sampled.
    #[serde(rename = "measure_interval_ms", with = "millis")]
    pub measure_interval: Duration,
    /// How many samples the rolling mean covers.
    pub measurements: usize,
    /// Measure only this process' share of total system CPU time.
    pub current_process_only: bool,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_cpu_usage:        DEFAULT_MAX_CPU_USAGE,
            measure_interval:     DEFAULT_MEASURE_INTERVAL,
            measurements:         DEFAULT_MEASUREMENTS,
            current_process_only: false,
        }
    }
}

impl LimiterConfig {
    /// A config with every field unset; `resolve` fills them all in.
    #[must_use]
    pub fn unset() -> Self {
        Self {
            max_cpu_usage:        0.0,
            measure_interval:     Duration::ZERO,
            measurements:         0,
            current_process_only: false,
        }
    }

    /// Replace unset or out-of-range fields and report what was changed.
    ///
    /// Never fails: a non-positive or non-finite ceiling, a zero interval
    /// and a zero window all fall back to the defaults, and a ceiling above
    /// 100% is clamped to 100.
    pub fn resolve(&mut self) -> Vec<Correction> {
        let mut corrections = Vec::new();

        if !self.max_cpu_usage.is_finite() || self.max_cpu_usage <= 0.0 {
            corrections.push(Correction::Defaulted {
                field: "max_cpu_usage",
                to:    format!("{DEFAULT_MAX_CPU_USAGE}%"),
            });
            self.max_cpu_usage = DEFAULT_MAX_CPU_USAGE;
        } else if self.max_cpu_usage > 100.0 {
            corrections.push(Correction::Clamped {
                field: "max_cpu_usage",
                from:  format!("{}%", self.max_cpu_usage),
                to:    "100%".to_string(),
            });
            self.max_cpu_usage = 100.0;
        }

        if self.measure_interval.is_zero() {
            corrections.push(Correction::Defaulted {
                field: "measure_interval",
                to:    format!("{DEFAULT_MEASURE_INTERVAL:?}"),
            });
            self.measure_interval = DEFAULT_MEASURE_INTERVAL;
        }

        if self.measurements == 0 {
            corrections.push(Correction::Defaulted {
                field: "measurements",
                to:    DEFAULT_MEASUREMENTS.to_string(),
            });
            self.measurements = DEFAULT_MEASUREMENTS;
        }

        corrections
    }
}

/// A silent fix applied by [`LimiterConfig::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correction {
    /// The field was unset (or unusable) and got its default.
    Defaulted { field: &'static str, to: String },
    /// The field was out of range and got clamped.
    Clamped { field: &'static str, from: String, to: String },
}

impl Correction {
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::Defaulted { field, .. } | Self::Clamped { field, .. } => *field,
        }
    }
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defaulted { field, to } => {
                write!(f, "{field} is unset, replaced with the default of {to}")
            }
            Self::Clamped { field, from, to } => {
                write!(f, "{field} of {from} is out of range, clamped to {to}")
            }
        }
    }
}

/// `Duration` as integer milliseconds in TOML.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_config_gets_every_default() {
        let mut config = LimiterConfig::unset();
        let corrections = config.resolve();

        assert_eq!(config, LimiterConfig::default());
        let fields: Vec<_> = corrections.iter().map(Correction::field).collect();
        assert_eq!(fields, ["max_cpu_usage", "measure_interval", "measurements"]);
    }

    #[test]
    fn explicit_values_are_kept() {
        let mut config = LimiterConfig {
            max_cpu_usage:        50.0,
            measure_interval:     Duration::from_millis(100),
            measurements:         5,
            current_process_only: true,
        };
        let before = config.clone();

        assert!(config.resolve().is_empty());
        assert_eq!(config, before);
    }

    #[test]
    fn ceiling_above_hundred_is_clamped() {
        let mut config = LimiterConfig { max_cpu_usage: 150.0, ..LimiterConfig::default() };
        let corrections = config.resolve();

        assert_eq!(config.max_cpu_usage, 100.0);
        assert!(matches!(corrections.as_slice(), [Correction::Clamped { .. }]));
    }

    #[test]
    fn negative_or_nan_ceiling_falls_back_to_default() {
        for bad in [-5.0, f64::NAN] {
            let mut config = LimiterConfig { max_cpu_usage: bad, ..LimiterConfig::default() };
            config.resolve();
            assert_eq!(config.max_cpu_usage, DEFAULT_MAX_CPU_USAGE);
        }
    }

    #[test]
    fn correction_display() {
        let correction = Correction::Defaulted { field: "measurements", to: "3".into() };
        assert_eq!(
            correction.to_string(),
            "measurements is unset, replaced with the default of 3"
        );
    }

    #[test]
    fn parses_toml_with_millis_interval() {
        let config: LimiterConfig = toml::from_str(
            "max_cpu_usage = 50.0\nmeasure_interval_ms = 250\ncurrent_process_only = true\n",
        )
        .unwrap();

        assert_eq!(config.max_cpu_usage, 50.0);
        assert_eq!(config.measure_interval, Duration::from_millis(250));
        assert_eq!(config.measurements, DEFAULT_MEASUREMENTS);
        assert!(config.current_process_only);
    }
}
