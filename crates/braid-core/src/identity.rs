use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier issued by the external identity provider for an
/// authenticated user.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-generated identifier carried by unauthenticated callers and
/// persisted locally on their device. May be blank if the client misbehaves;
/// services reject blank ids before touching storage.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The resolved identity context of one call. Authenticated callers operate
/// on the permanent track, anonymous callers on the temporary track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Caller {
    User(UserId),
    Anonymous(ClientId),
}

impl Caller {
    /// The identity string rows are owned by on this caller's track.
    pub fn owner_id(&self) -> &str {
        match self {
            Self::User(id) => id.as_str(),
            Self::Anonymous(id) => id.as_str(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_id_for_both_variants() {
        let user = Caller::User(UserId::from_raw("user_abc"));
        assert_eq!(user.owner_id(), "user_abc");
        assert!(user.is_authenticated());

        let anon = Caller::Anonymous(ClientId::from_raw("anon_xyz"));
        assert_eq!(anon.owner_id(), "anon_xyz");
        assert!(!anon.is_authenticated());
    }

    #[test]
    fn blank_client_id_detected() {
        assert!(ClientId::from_raw("").is_blank());
        assert!(ClientId::from_raw("   ").is_blank());
        assert!(!ClientId::from_raw("anon_1").is_blank());
    }

    #[test]
    fn user_id_serde_is_transparent() {
        let id = UserId::from_raw("user_1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"user_1\"");
    }
}
