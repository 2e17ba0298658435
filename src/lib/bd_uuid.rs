// SPDX-License-Identifier: Apache-2.0

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{BdError, ErrorKind};

/// Identifier for edit sessions, deployments and commits.
///
/// Stored as an unsigned 128 bit integer internally but always
/// serialized as an RFC-4122 string so it round-trips through the
/// store's JSON columns and any non-Rust tooling that inspects them.
#[repr(transparent)]
#[derive(PartialEq, Eq, Default, Clone, Copy, Hash, Debug, PartialOrd, Ord)]
pub struct BdUuid(u128);

impl AsRef<u128> for BdUuid {
    fn as_ref(&self) -> &u128 {
        &self.0
    }
}

impl std::ops::Deref for BdUuid {
    type Target = u128;

    fn deref(&self) -> &u128 {
        &self.0
    }
}

impl std::fmt::Display for BdUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

impl BdUuid {
    pub const VOID: Self = Self(0);

    pub fn new() -> Self {
        let uuid = uuid::Uuid::now_v7().as_u128();
        if uuid == 0 { Self::new() } else { Self(uuid) }
    }
}

impl From<u128> for BdUuid {
    fn from(d: u128) -> Self {
        Self(d)
    }
}

// u128 is not natively supported by serde in a portable wire format,
// so we always go through the UUID string form.
impl Serialize for BdUuid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BdUuid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let uuid_str = <String>::deserialize(deserializer)?;
        Ok(Self(
            uuid::Uuid::from_str(&uuid_str)
                .map_err(serde::de::Error::custom)?
                .as_u128(),
        ))
    }
}

impl FromStr for BdUuid {
    type Err = BdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(
            uuid::Uuid::parse_str(s)
                .map_err(|e| {
                    BdError::new(
                        ErrorKind::InvalidArgument,
                        format!("Invalid UUID string {s}: {e}"),
                    )
                })?
                .as_u128(),
        ))
    }
}
