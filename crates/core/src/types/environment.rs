//! Smaregi deployment selection.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Environment`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentError {
    /// Not `dev` or `prod`.
    #[error("environment must be \"dev\" or \"prod\", got {0:?}")]
    Unknown(String),
}

/// Which of the two vendor API deployments requests target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Sandbox deployment (`smaregi.dev`).
    Dev,
    /// Production deployment (`smaregi.jp`).
    Prod,
}

impl Environment {
    /// Default identity (token) base URL for this deployment.
    #[must_use]
    pub const fn default_id_base(self) -> &'static str {
        match self {
            Self::Dev => "https://id.smaregi.dev/app",
            Self::Prod => "https://id.smaregi.jp/app",
        }
    }

    /// Default REST API base URL for this deployment.
    #[must_use]
    pub const fn default_api_base(self) -> &'static str {
        match self {
            Self::Dev => "https://api.smaregi.dev",
            Self::Prod => "https://api.smaregi.jp",
        }
    }

    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = EnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => Err(EnvironmentError::Unknown(other.to_owned())),
        }
    }
}
