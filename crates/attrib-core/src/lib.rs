use serde::{Deserialize, Serialize};
use thiserror::Error;

mod app_config;
mod config;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};

/// How a conversion was attributed to a campaign.
///
/// `TimeWindow` when exactly one campaign link matched the order line;
/// `Proportional` when the line's value and spend were split equally across
/// several simultaneously matching links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMethod {
    TimeWindow,
    Proportional,
}

impl AttributionMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AttributionMethod::TimeWindow => "time_window",
            AttributionMethod::Proportional => "proportional",
        }
    }

    /// Parse the database representation back into the enum.
    ///
    /// Unknown values map to `None`; callers decide whether that is an error.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "time_window" => Some(AttributionMethod::TimeWindow),
            "proportional" => Some(AttributionMethod::Proportional),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttributionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
