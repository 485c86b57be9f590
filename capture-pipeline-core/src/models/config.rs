use std::path::PathBuf;
use std::time::Duration;

use super::lane::Lane;

/// Retry parameters for one lane.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneBackoffConfig {
    /// Base delay fed into the lane's backoff curve.
    pub base_delay: Duration,

    /// Jitter is sampled uniformly from [-max_jitter, +max_jitter].
    pub max_jitter: Duration,

    /// Ceiling for the exponential curve (heavy lane); None = uncapped.
    pub max_cap: Option<Duration>,

    /// A failing attempt that reaches this count moves the row to the
    /// terminal FAILED state instead of scheduling another retry.
    pub max_attempts: u32,
}

/// Configuration for the shard pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Length of one shard; also the rotation timer period.
    pub shard_duration: Duration,

    /// Directory where the capture collaborators write sealed artifacts.
    pub output_directory: PathBuf,

    pub light_lane: LaneBackoffConfig,
    pub heavy_lane: LaneBackoffConfig,

    /// Upper bound on rows fetched per worker pass, to cap memory on
    /// large backlogs.
    pub fetch_limit: usize,
}

impl PipelineConfig {
    pub fn lane(&self, lane: Lane) -> &LaneBackoffConfig {
        match lane {
            Lane::Light => &self.light_lane,
            Lane::Heavy => &self.heavy_lane,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.shard_duration.is_zero() {
            return Err("shard duration must be positive".into());
        }
        if self.fetch_limit == 0 {
            return Err("fetch limit must be positive".into());
        }
        for (name, lane) in [("light", &self.light_lane), ("heavy", &self.heavy_lane)] {
            if lane.base_delay.is_zero() {
                return Err(format!("{} lane base delay must be positive", name));
            }
            if lane.max_attempts == 0 {
                return Err(format!("{} lane max attempts must be positive", name));
            }
            if let Some(cap) = lane.max_cap {
                if cap < lane.base_delay {
                    return Err(format!("{} lane cap is below its base delay", name));
                }
            }
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            shard_duration: Duration::from_secs(300),
            output_directory: PathBuf::from("."),
            light_lane: LaneBackoffConfig {
                base_delay: Duration::from_secs(10),
                max_jitter: Duration::from_secs(5),
                max_cap: None,
                max_attempts: 10,
            },
            heavy_lane: LaneBackoffConfig {
                base_delay: Duration::from_secs(30),
                max_jitter: Duration::from_secs(15),
                max_cap: Some(Duration::from_secs(1800)),
                max_attempts: 8,
            },
            fetch_limit: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_shard_duration() {
        let mut config = PipelineConfig::default();
        config.shard_duration = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_cap_below_base() {
        let mut config = PipelineConfig::default();
        config.heavy_lane.max_cap = Some(Duration::from_secs(1));
        assert!(config.validate().is_err());
    }
}
