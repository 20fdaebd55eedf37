//! Host integration settings.
//!
//! | variable | default | meaning |
//! |---|---|---|
//! | `TETHER_TASK_DELAY_MS` | 0 | delay before a submitted command starts |
//! | `TETHER_REPORT_CAPACITY` | 100 | task reports buffered for the host |

use std::time::Duration;

use tether_utils::{env_or, ConfigError};

pub const TASK_DELAY_ENV: &str = "TETHER_TASK_DELAY_MS";
pub const REPORT_CAPACITY_ENV: &str = "TETHER_REPORT_CAPACITY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostConfig
{
    /// Delay applied by [`run_async`](crate::run_async)
    pub task_delay: Duration,
    /// Capacity of the task report channel
    pub report_capacity: usize,
}

impl Default for HostConfig
{
    fn default() -> Self
    {
        Self {
            task_delay: Duration::ZERO,
            report_capacity: 100,
        }
    }
}

impl HostConfig
{
    /// Defaults overridden by the environment.
    ///
    /// ## Errors
    ///
    /// A variable is set to something that is not a non-negative integer.
    pub fn from_env() -> Result<Self, ConfigError>
    {
        let defaults = Self::default();
        let delay_ms = env_or(TASK_DELAY_ENV, 0_u64)?;
        Ok(Self {
            task_delay: Duration::from_millis(delay_ms),
            report_capacity: env_or(REPORT_CAPACITY_ENV, defaults.report_capacity)?,
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_defaults()
    {
        let config = HostConfig::default();
        assert_eq!(config.task_delay, Duration::ZERO);
        assert_eq!(config.report_capacity, 100);
    }
}
