//! Case-insensitive service identifiers

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier of the default rule
pub const DEFAULT_RULE_ID: &str = "*";

/// Name of a service, usually a class or interface name.
///
/// Comparison, hashing and ordering ignore ASCII case; the original spelling is
/// kept for display. A single leading `\` and surrounding whitespace are
/// dropped, so `"\App\Logger"` and `"app\logger"` name the same service.
#[derive(Clone)]
pub struct ServiceId {
    name: Arc<str>,
    key: Arc<str>,
}

impl ServiceId {
    pub fn new(name: &str) -> Self {
        let trimmed = name.trim();
        let trimmed = trimmed.strip_prefix('\\').unwrap_or(trimmed);
        Self {
            name: Arc::from(trimmed),
            key: Arc::from(trimmed.to_ascii_lowercase().as_str()),
        }
    }

    /// The id of the default (`*`) rule
    pub fn default_rule() -> Self {
        Self::new(DEFAULT_RULE_ID)
    }

    pub fn is_default_rule(&self) -> bool {
        &*self.key == DEFAULT_RULE_ID
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Lower-cased lookup key
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

impl PartialEq for ServiceId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ServiceId {}

impl Hash for ServiceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for ServiceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServiceId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceId({:?})", &*self.name)
    }
}

impl From<&str> for ServiceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ServiceId {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&String> for ServiceId {
    fn from(value: &String) -> Self {
        Self::new(value)
    }
}

impl From<&ServiceId> for ServiceId {
    fn from(value: &ServiceId) -> Self {
        value.clone()
    }
}

impl Serialize for ServiceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for ServiceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::new(&name))
    }
}
