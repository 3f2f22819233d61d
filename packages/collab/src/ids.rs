//! # Identifiers
//!
//! A [`VersionId`] is a random 128-bit token. The version reached by
//! applying a transition is the XOR of the base version and the
//! transition's id, so two replicas that apply the same transitions in
//! different orders agree on the resulting id without talking to each
//! other. With uniformly random tokens, the chance that any two of `n`
//! distinct transition sets collide is about `n² / 2^129`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitXor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct VersionId(pub u128);

impl VersionId {
    /// The initial, empty version.
    pub const NULL: VersionId = VersionId(0);

    pub fn random() -> Self {
        VersionId(rand::thread_rng().gen())
    }

    pub fn combine(self, other: VersionId) -> VersionId {
        VersionId(self.0 ^ other.0)
    }
}

impl BitXor for VersionId {
    type Output = VersionId;

    fn bitxor(self, other: VersionId) -> VersionId {
        self.combine(other)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl From<VersionId> for String {
    fn from(id: VersionId) -> String {
        id.to_string()
    }
}

impl TryFrom<String> for VersionId {
    type Error = std::num::ParseIntError;

    fn try_from(hex: String) -> Result<Self, Self::Error> {
        u128::from_str_radix(&hex, 16).map(VersionId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_is_order_independent() {
        let (a, b, c) = (VersionId::random(), VersionId::random(), VersionId::random());
        assert_eq!(VersionId::NULL ^ a ^ b ^ c, VersionId::NULL ^ c ^ a ^ b);
        assert_eq!(a ^ a, VersionId::NULL);
    }

    #[test]
    fn test_version_id_json_is_hex() {
        let id = VersionId(u128::MAX - 1);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"fffffffffffffffffffffffffffffffe\"");
        assert_eq!(serde_json::from_str::<VersionId>(&json).unwrap(), id);
        assert!(serde_json::from_str::<VersionId>("\"not hex\"").is_err());
    }
}
