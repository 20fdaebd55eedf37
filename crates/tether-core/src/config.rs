//! Model configuration.
//!
//! | variable | default | meaning |
//! |---|---|---|
//! | `TETHER_SEARCH_DEPTH` | 2 | levels below a path searched for a suitable object |
//! | `TETHER_NOTIFY_CAPACITY` | 256 | events buffered per notification subscriber |

use tether_utils::{env_or, ConfigError};

pub const SEARCH_DEPTH_ENV: &str = "TETHER_SEARCH_DEPTH";
pub const NOTIFY_CAPACITY_ENV: &str = "TETHER_NOTIFY_CAPACITY";

/// Settings of one object model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelConfig
{
    /// How many levels below the requested path `suitable` looks once no
    /// ancestor qualifies
    pub search_depth: usize,
    /// Capacity of the model-event broadcast channel
    pub notification_capacity: usize,
}

impl Default for ModelConfig
{
    fn default() -> Self
    {
        Self {
            search_depth: 2,
            notification_capacity: 256,
        }
    }
}

impl ModelConfig
{
    /// Defaults overridden by the environment.
    ///
    /// ## Errors
    ///
    /// A variable is set to something that is not a non-negative integer.
    pub fn from_env() -> Result<Self, ConfigError>
    {
        let defaults = Self::default();
        Ok(Self {
            search_depth: env_or(SEARCH_DEPTH_ENV, defaults.search_depth)?,
            notification_capacity: env_or(NOTIFY_CAPACITY_ENV, defaults.notification_capacity)?,
        })
    }

    #[must_use]
    pub fn with_search_depth(mut self, depth: usize) -> Self
    {
        self.search_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_defaults()
    {
        let config = ModelConfig::default();
        assert_eq!(config.search_depth, 2);
        assert_eq!(config.with_search_depth(0).search_depth, 0);
    }
}
