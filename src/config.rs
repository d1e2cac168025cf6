//! CLI configuration via clap.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::error::{Error, Result};
use crate::types::MAX_BLOCK;

/// Which buffer carries blocks from the producer to the consumer.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Lock-free triple buffer.
    #[default]
    Triple,
    /// Mutex-guarded double buffer.
    Locked,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "frame-relay")]
#[command(about = "Streams sample blocks from a periodic producer to a polling consumer")]
pub struct Config {
    /// Producer cycle in microseconds (512 samples at 48 kHz ≈ 10600)
    #[arg(long, default_value_t = 10_600)]
    pub producer_period_us: u64,

    /// Consumer poll period in microseconds
    #[arg(long, default_value_t = 10_000)]
    pub consumer_period_us: u64,

    /// Samples per block
    #[arg(short, long, default_value_t = 512)]
    pub block_size: usize,

    /// Run time in seconds; 0 runs until Ctrl-C
    #[arg(short, long, default_value_t = 2)]
    pub duration_secs: u64,

    /// Buffer implementation
    #[arg(short, long, value_enum, default_value_t = Mode::Triple)]
    pub mode: Mode,

    /// Print Prometheus-format statistics on exit
    #[arg(long)]
    pub metrics: bool,
}

/// Validated relay parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    pub producer_period: Duration,
    pub consumer_period: Duration,
    pub block_size: usize,
    pub mode: Mode,
}

impl Config {
    /// Check ranges and convert to [`RelaySettings`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if a period is zero or the block size is
    /// outside `1..=MAX_BLOCK`.
    pub fn validate(&self) -> Result<RelaySettings> {
        if self.producer_period_us == 0 {
            return Err(Error::InvalidConfig {
                field: "producer_period_us",
                reason: "must be greater than zero".into(),
            });
        }
        if self.consumer_period_us == 0 {
            return Err(Error::InvalidConfig {
                field: "consumer_period_us",
                reason: "must be greater than zero".into(),
            });
        }
        if !(1..=MAX_BLOCK).contains(&self.block_size) {
            return Err(Error::InvalidConfig {
                field: "block_size",
                reason: format!("must be in 1..={MAX_BLOCK}, got {}", self.block_size),
            });
        }
        Ok(RelaySettings {
            producer_period: Duration::from_micros(self.producer_period_us),
            consumer_period: Duration::from_micros(self.consumer_period_us),
            block_size: self.block_size,
            mode: self.mode,
        })
    }

    /// `None` means run until interrupted.
    #[must_use]
    pub fn run_time(&self) -> Option<Duration> {
        if self.duration_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.duration_secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let argv = std::iter::once("frame-relay").chain(args.iter().copied());
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_audio_example() {
        let config = parse(&[]);
        let settings = config.validate().unwrap();
        assert_eq!(settings.producer_period, Duration::from_micros(10_600));
        assert_eq!(settings.consumer_period, Duration::from_millis(10));
        assert_eq!(settings.block_size, 512);
        assert_eq!(settings.mode, Mode::Triple);
        assert_eq!(config.run_time(), Some(Duration::from_secs(2)));
        assert!(!config.metrics);
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&["--mode", "locked", "-b", "64", "-d", "0", "--metrics"]);
        let settings = config.validate().unwrap();
        assert_eq!(settings.mode, Mode::Locked);
        assert_eq!(settings.block_size, 64);
        assert_eq!(config.run_time(), None);
        assert!(config.metrics);
    }

    #[test]
    fn rejects_zero_period() {
        let config = parse(&["--producer-period-us", "0"]);
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidConfig {
                field: "producer_period_us",
                ..
            }
        ));
    }

    #[test]
    fn rejects_oversized_block() {
        let err = parse(&["--block-size", "4096"]).validate().unwrap_err();
        assert!(err.to_string().contains("block_size"));
    }
}
