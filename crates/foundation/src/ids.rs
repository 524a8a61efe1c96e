use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Declares an opaque, string-backed identifier.
///
/// Ids are compared, hashed and ordered by their text so registries that key
/// on them iterate deterministically.
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

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Raster or vector data layer handle.
    LayerId
);
string_id!(
    /// UI panel (layer list, time selector, legend...).
    PanelId
);
string_id!(
    /// Theme or sub-theme.
    ThemeId
);
string_id!(
    /// Checkbox, radio group or multi-select control.
    ControlId
);
string_id!(
    /// Exclusive layer group.
    GroupId
);
string_id!(
    /// Filter criterion (species, member nation, organization...).
    CriterionId
);
string_id!(OrgId);

#[cfg(test)]
mod tests {
    use super::{LayerId, OrgId};
    use std::collections::BTreeMap;

    #[test]
    fn ids_order_by_text() {
        let mut m = BTreeMap::new();
        m.insert(LayerId::new("sstMonthly"), 1);
        m.insert(LayerId::new("chlAnnual"), 2);
        let keys: Vec<&str> = m.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["chlAnnual", "sstMonthly"]);
        // Borrow<str> lets maps be queried with plain strings.
        assert_eq!(m.get("chlAnnual"), Some(&2));
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&OrgId::new("WCPFC")).unwrap();
        assert_eq!(json, "\"WCPFC\"");
    }
}
