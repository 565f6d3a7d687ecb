//! The POS display flag.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors that can occur when parsing a [`DisplayFlag`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DisplayFlagError {
    /// The value is not one of the accepted encodings.
    #[error("display flag must be \"0\" or \"1\", got {0:?}")]
    Invalid(String),
}

/// Whether a product or category is shown at the point of sale.
///
/// On the wire Smaregi uses the strings `"1"` (shown) and `"0"` (hidden).
/// Records coming back from the API are normalized on the way in:
///
/// | Input | Flag |
/// |---|---|
/// | `"1"`, `1`, `true` | [`DisplayFlag::Shown`] |
/// | `"0"`, `0`, `false`, `null` | [`DisplayFlag::Hidden`] |
///
/// Anything else is rejected. A missing field defaults to hidden.
///
/// ```
/// use display_toggle_core::DisplayFlag;
///
/// let flag: DisplayFlag = serde_json::from_str("true").unwrap();
/// assert_eq!(flag, DisplayFlag::Shown);
/// assert_eq!(serde_json::to_string(&flag).unwrap(), "\"1\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplayFlag {
    /// `"0"`
    #[default]
    Hidden,
    /// `"1"`
    Shown,
}

impl DisplayFlag {
    /// Map a checkbox state to a flag.
    #[must_use]
    pub const fn from_shown(shown: bool) -> Self {
        if shown { Self::Shown } else { Self::Hidden }
    }

    /// Returns `true` for [`DisplayFlag::Shown`].
    #[must_use]
    pub const fn is_shown(self) -> bool {
        matches!(self, Self::Shown)
    }

    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hidden => "0",
            Self::Shown => "1",
        }
    }
}

impl fmt::Display for DisplayFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayFlag {
    type Err = DisplayFlagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Self::Shown),
            "0" => Ok(Self::Hidden),
            other => Err(DisplayFlagError::Invalid(other.to_owned())),
        }
    }
}

impl Serialize for DisplayFlag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Integer(i64),
    Text(String),
    Null(()),
}

impl<'de> Deserialize<'de> for DisplayFlag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawFlag::deserialize(deserializer)? {
            RawFlag::Bool(shown) => Ok(Self::from_shown(shown)),
            RawFlag::Integer(1) => Ok(Self::Shown),
            RawFlag::Integer(0) | RawFlag::Null(()) => Ok(Self::Hidden),
            RawFlag::Integer(other) => Err(serde::de::Error::custom(DisplayFlagError::Invalid(
                other.to_string(),
            ))),
            RawFlag::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}
