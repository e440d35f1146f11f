//! Operation keys.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Identifies one logically distinct protected call site.
///
/// Every piece of per-call-site state (bulkhead pool, circuit breaker, rolling
/// window, fallback) is looked up by this key. Cloning is cheap.
///
/// ```
/// use bulwark_core::OperationKey;
///
/// let key = OperationKey::from("organization-lookup");
/// assert_eq!(key.as_str(), "organization-lookup");
/// assert_eq!(key, "organization-lookup");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationKey(Arc<str>);

impl OperationKey {
    /// Creates a key from anything string-like.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for OperationKey {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&String> for OperationKey {
    fn from(s: &String) -> Self {
        Self::new(s)
    }
}

impl From<&OperationKey> for OperationKey {
    fn from(key: &OperationKey) -> Self {
        key.clone()
    }
}

impl AsRef<str> for OperationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for OperationKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for OperationKey {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for OperationKey {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for OperationKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for OperationKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}
