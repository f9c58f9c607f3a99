//! Migration version identifiers.
//!
//! A version is an ordered tuple of non-negative integers written as
//! `1.2.3` or `1_2_3`. Missing trailing components compare as zero, so
//! `1`, `1.0` and `1_0_0` are the same version.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MigrationError;

/// A totally ordered migration version.
#[derive(Debug, Clone)]
pub struct Version {
    parts: Vec<u64>,
}

impl Version {
    /// Build a version from its numeric components.
    ///
    /// Returns `None` when `parts` is empty.
    pub fn from_parts(parts: impl Into<Vec<u64>>) -> Option<Self> {
        let parts = parts.into();
        if parts.is_empty() {
            None
        } else {
            Some(Self { parts })
        }
    }

    /// The numeric components as written.
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// The major (first) component.
    pub fn major(&self) -> u64 {
        self.parts[0]
    }

    /// Components with trailing zeros removed; equal versions share this form.
    fn significant(&self) -> &[u64] {
        let end = self
            .parts
            .iter()
            .rposition(|p| *p != 0)
            .map_or(0, |i| i + 1);
        &self.parts[..end]
    }
}

impl FromStr for Version {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| MigrationError::InvalidVersion {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        if s.is_empty() {
            return Err(invalid("version is empty"));
        }

        let parts = s
            .split(['.', '_'])
            .map(|part| {
                if part.is_empty() {
                    return Err(invalid("empty version component"));
                }
                if !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid("version components must be non-negative integers"));
                }
                part.parse::<u64>()
                    .map_err(|_| invalid("version component out of range"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { parts })
    }
}

impl From<u64> for Version {
    fn from(major: u64) -> Self {
        Self { parts: vec![major] }
    }
}

impl TryFrom<&str> for Version {
    type Error = MigrationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.parts {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", part)?;
            first = false;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
