//! Identifier factory
//!
//! Every entity the session core tracks gets its own id newtype so a tab id can
//! never be passed where a script id is expected. All ids are UUID v4 values
//! rendered as hyphenated strings when persisted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Common behaviour of all entity identifiers
pub trait EntityId: Clone + Eq + std::hash::Hash + fmt::Display {
    /// Wrap an existing UUID
    fn from_uuid(uuid: Uuid) -> Self;

    /// The underlying UUID
    fn as_uuid(&self) -> &Uuid;
}

/// Generate a fresh identifier of the requested kind.
///
/// ```rust,ignore
/// let tab_id: TabId = make_id();
/// let script_id = make_id::<ScriptId>();
/// ```
pub fn make_id<T: EntityId>() -> T {
    T::from_uuid(Uuid::new_v4())
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random id
            pub fn new() -> Self {
                make_id()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl EntityId for $name {
            fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// Identifier of an open tab
    TabId
);
define_id!(
    /// Identifier of a SQL script
    ScriptId
);
define_id!(
    /// Identifier of a registered data source (flat file view or attached database)
    DataSourceId
);
define_id!(
    /// Identifier of a saved comparison
    ComparisonId
);
define_id!(
    /// Identifier of a stored script version
    VersionId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_make_id_is_unique() {
        let ids: HashSet<TabId> = (0..1000).map(|_| make_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_id_display_round_trips_through_from_str() {
        let id = ScriptId::new();
        let parsed: ScriptId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = TabId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
