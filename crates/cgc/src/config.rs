//! Configuration Module - GC Tuning Parameters
//!
//! Manages all configuration parameters for CGC.
//! Proper configuration balances collection frequency against the cost of
//! walking the live set.

/// Main configuration for the CGC collector
///
/// Stores all parameters affecting collector behavior.
/// All parameters have sensible defaults.
///
/// # Examples
///
/// ```rust
/// use cgc::GcConfig;
///
/// // Use default configuration
/// let config = GcConfig::default();
///
/// // Collect more eagerly
/// let config = GcConfig {
///     initial_trigger: 128,
///     trigger_floor: 128,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Allocations before the first automatic collection
    ///
    /// Every allocation decrements a heap-wide countdown; when it reaches
    /// zero, a collection runs before the allocation proceeds.
    ///
    /// Default: 1024
    pub initial_trigger: i64,

    /// Lower bound for the recalibrated trigger
    ///
    /// After each collection the countdown is reset to
    /// `max(2 * live_objects, trigger_floor)`, so collection frequency
    /// scales with working-set size but never drops below this floor.
    ///
    /// Default: 1024
    pub trigger_floor: i64,

    /// Enable GC statistics collection
    ///
    /// Collects allocation and reclamation counters, per-cycle summaries.
    /// Default: true
    pub stats_enabled: bool,

    /// Emit cycle events as JSON instead of human-readable text
    ///
    /// Events still go through the `log` facade either way.
    /// Default: false
    pub log_json: bool,
}

impl Default for GcConfig {
    /// Default configuration for CGC
    ///
    /// Balanced for general-purpose workloads.
    fn default() -> Self {
        GcConfig {
            initial_trigger: 1024,
            trigger_floor: 1024,
            stats_enabled: true,
            log_json: false,
        }
    }
}

impl GcConfig {
    /// Validate configuration
    ///
    /// Checks if all values are in valid ranges.
    /// Returns error if configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cgc::GcConfig;
    ///
    /// let config = GcConfig {
    ///     trigger_floor: 0,  // Invalid!
    ///     ..Default::default()
    /// };
    ///
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_trigger <= 0 {
            return Err(ConfigError::InvalidTrigger(
                "initial_trigger must be > 0".to_string(),
            ));
        }

        if self.trigger_floor <= 0 {
            return Err(ConfigError::InvalidTrigger(
                "trigger_floor must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - CGC_INITIAL_TRIGGER
    /// - CGC_TRIGGER_FLOOR
    /// - CGC_STATS
    /// - CGC_LOG_JSON
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CGC_INITIAL_TRIGGER") {
            if let Ok(n) = val.parse::<i64>() {
                config.initial_trigger = n;
            }
        }

        if let Ok(val) = std::env::var("CGC_TRIGGER_FLOOR") {
            if let Ok(n) = val.parse::<i64>() {
                config.trigger_floor = n;
            }
        }

        if let Ok(val) = std::env::var("CGC_STATS") {
            config.stats_enabled = val == "1" || val.eq_ignore_ascii_case("true");
        }

        if let Ok(val) = std::env::var("CGC_LOG_JSON") {
            config.log_json = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),
}
