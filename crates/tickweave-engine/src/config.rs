//! Simulator configuration, validation, and error types.
//!
//! [`SimConfig`] controls how a design is elaborated and how its tick
//! procedure is generated. [`validate()`](SimConfig::validate) checks
//! the configuration itself; [`Design::validate`](crate::Design::validate)
//! checks the design's connections against its signal table.

use std::error::Error;
use std::fmt;

use tickweave_core::SignalId;

// ── TickMode ───────────────────────────────────────────────────────

/// How the scheduled block calls are compiled into a tick procedure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TickMode {
    /// Sequential dispatch over an array of block behaviors.
    #[default]
    Normal,
    /// Block calls fused at generation time into one composed procedure.
    Unrolled,
}

impl fmt::Display for TickMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Unrolled => write!(f, "unrolled"),
        }
    }
}

// ── SimConfig ──────────────────────────────────────────────────────

/// Elaboration and execution settings for a [`Simulator`](crate::Simulator).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimConfig {
    /// Tick procedure flavor. Default: [`TickMode::Normal`].
    pub tick_mode: TickMode,
    /// Reject designs where a top-level output port has no driver.
    /// Default: `false`.
    pub deny_undriven_outputs: bool,
    /// Upper bound on the cycles a single
    /// [`run()`](crate::Simulator::run) call advances; longer requests
    /// are clamped. Default: 1_000_000.
    pub max_cycles_per_run: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_mode: TickMode::Normal,
            deny_undriven_outputs: false,
            max_cycles_per_run: 1_000_000,
        }
    }
}

impl SimConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. A run must be allowed to make progress.
        if self.max_cycles_per_run == 0 {
            return Err(ConfigError::ZeroCycleBudget);
        }
        Ok(())
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected by configuration or design validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `max_cycles_per_run` is zero.
    ZeroCycleBudget,
    /// A connection references a signal missing from the signal table.
    UnknownConnectionEndpoint {
        /// The missing signal.
        signal: SignalId,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroCycleBudget => write!(f, "max_cycles_per_run must be at least 1"),
            Self::UnknownConnectionEndpoint { signal } => {
                write!(f, "connection references unknown signal {signal}")
            }
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = SimConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.tick_mode, TickMode::Normal);
        assert!(!cfg.deny_undriven_outputs);
    }

    #[test]
    fn zero_cycle_budget_fails() {
        let cfg = SimConfig {
            max_cycles_per_run: 0,
            ..SimConfig::default()
        };
        match cfg.validate() {
            Err(ConfigError::ZeroCycleBudget) => {}
            other => panic!("expected ZeroCycleBudget, got {other:?}"),
        }
    }

    #[test]
    fn error_display_names_the_signal() {
        let e = ConfigError::UnknownConnectionEndpoint {
            signal: SignalId(7),
        };
        assert!(e.to_string().contains('7'));
    }
}
