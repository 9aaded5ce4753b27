//! Typed identifiers
//!
//! Every entity is keyed by a random (v4) UUID. Wrapping each kind in its own
//! type keeps a channel ID from being passed where a message ID belongs.

use std::str::FromStr;

use uuid::Uuid;

use crate::error::Error;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| Error::InvalidId(s.to_string()))
            }
        }
    };
}

uuid_id!(
    /// Chat channel identifier, the topic key for new-message notifications
    ChannelId
);
uuid_id!(
    /// Message identifier, the value delivered to subscribers
    MessageId
);
uuid_id!(
    /// User identifier
    UserId
);
uuid_id!(
    /// Stored attachment blob identifier
    AttachmentId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let id = ChannelId::new();
        let parsed: ChannelId = id.to_string().parse().unwrap();

        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_invalid() {
        let result = "not-a-uuid".parse::<MessageId>();

        assert!(matches!(result, Err(Error::InvalidId(s)) if s == "not-a-uuid"));
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(MessageId::new(), MessageId::new());
    }
}
