// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed identifiers for pools, containers, and tenants.
//!
//! Pool and container ids are short ASCII tokens minted on this node,
//! so they live inline in a fixed NUL-padded byte array and stay
//! `Copy`. Tenant ids arrive from callers and can be any string, so
//! they wrap a heap allocation instead.

/// Capacity of an inline id, in bytes.
pub const ID_CAPACITY: usize = 32;

/// NUL-padded inline id storage.
///
/// Equal id strings pack to equal arrays, so equality and hashing
/// derive straight from the bytes. Input past the capacity (or
/// containing a NUL) is cut at the nearest char boundary; generated
/// ids never get close to the cap.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct RawId([u8; ID_CAPACITY]);

impl RawId {
    fn pack(s: &str) -> Self {
        let mut bytes = [0u8; ID_CAPACITY];
        let mut end = 0;
        for c in s.chars() {
            let width = c.len_utf8();
            if c == '\0' || end + width > ID_CAPACITY {
                break;
            }
            c.encode_utf8(&mut bytes[end..end + width]);
            end += width;
        }
        Self(bytes)
    }

    fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(ID_CAPACITY);
        // pack() only stores whole chars, so this never fails.
        std::str::from_utf8(&self.0[..end]).unwrap_or("")
    }
}

/// Declare an inline id type with a fixed prefix.
macro_rules! node_id {
    ($(#[$doc:meta])* $name:ident => $prefix:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(RawId);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Wrap an existing id string (parsing, row hydration).
            pub fn from_string(id: impl AsRef<str>) -> Self {
                Self(RawId::pack(id.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({:?})"), self.as_str())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_string(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_string(&s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.as_str() == *other
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                if s.len() > ID_CAPACITY {
                    return Err(serde::de::Error::custom(format!(
                        "id longer than {} bytes: {:?}",
                        ID_CAPACITY, s
                    )));
                }
                Ok(Self::from_string(&s))
            }
        }
    };
}

node_id! {
    /// Pool identifier (`pool-` prefix).
    PoolId => "pool-"
}

node_id! {
    /// Container identifier (`ctr-` prefix).
    ///
    /// Minted via [`ContainerId::generate`]: a millisecond timestamp
    /// prefix keeps ids sorted by creation order and host directory
    /// listings readable.
    ContainerId => "ctr-"
}

impl PoolId {
    /// Mint a fresh random pool id.
    pub fn new() -> Self {
        Self::from_string(format!("{}{}", Self::PREFIX, nanoid::nanoid!(16)))
    }
}

impl Default for PoolId {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerId {
    /// Mint `ctr-<epoch_ms hex>-<random>`: monotonic prefix, random
    /// suffix.
    pub fn generate(epoch_ms: u64) -> Self {
        Self::from_string(format!("{}{:x}-{}", Self::PREFIX, epoch_ms, nanoid::nanoid!(6)))
    }
}

/// Tenant identifier.
///
/// Chosen by callers (API keys, user ids, session names), so it has no
/// prefix and no length cap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for TenantId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
