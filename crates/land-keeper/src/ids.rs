use std::fmt;

macro_rules! newtype_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }
    };
}

/// One physical connection. Distinct from [`ClientID`]: a client that
/// reconnects gets a new session but keeps the same client identity.
newtype_id!(SessionID);

/// A stable per-device/browser identity, independent of any one connection.
newtype_id!(ClientID);

/// A player's identity within a land, independent of the client or session
/// currently controlling it (a reconnect keeps the same `PlayerID`).
newtype_id!(PlayerID);

/// Identifies a land instance: a land type name plus an optional instance
/// discriminator (`None` for singleton land types).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LandID {
    pub land_type: String,
    pub land_instance_id: Option<String>,
}

impl LandID {
    pub fn new(land_type: impl Into<String>, land_instance_id: Option<String>) -> Self {
        Self { land_type: land_type.into(), land_instance_id }
    }
}

impl fmt::Display for LandID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.land_instance_id {
            Some(instance) => write!(f, "{}#{}", self.land_type, instance),
            None => write!(f, "{}", self.land_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn land_id_display_includes_instance_only_when_present() {
        let singleton = LandID::new("lobby", None);
        let instanced = LandID::new("match", Some("42".to_owned()));
        assert_eq!(singleton.to_string(), "lobby");
        assert_eq!(instanced.to_string(), "match#42");
    }
}
