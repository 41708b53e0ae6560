//! Stable identifiers for survey data.
//!
//! All ids are opaque strings taken from the source files; they order and hash
//! by their text so maps keyed by them iterate deterministically.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Tree identifier (the survey's 立木ID column).
    TreeId
);
string_id!(
    /// Mesh cell identifier from the grid's `id` property.
    MeshId
);
string_id!(
    /// Survey area name (the TLS extent's エリア property).
    AreaName
);

#[cfg(test)]
mod tests {
    use super::{AreaName, MeshId};

    #[test]
    fn ids_display_their_text() {
        assert_eq!(MeshId::new("A-12").to_string(), "A-12");
        assert_eq!(AreaName::from("北区").as_str(), "北区");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&MeshId::new("7")).unwrap();
        assert_eq!(json, "\"7\"");
    }
}
