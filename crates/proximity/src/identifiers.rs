//! Type-safe identifiers for bus and rail entities.
//!
//! All identifiers use Arc<str> so rows can be cloned between stages without
//! copying their keys.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

macro_rules! impl_identifier {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(s: impl AsRef<str>) -> Self {
                Self(s.as_ref().into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.hash(state);
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

impl_identifier!(StopCode);
impl_identifier!(ExitIdentifier);
impl_identifier!(ServiceNumber);
impl_identifier!(StationName);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_equality() {
        let id1 = StopCode::new("01012");
        let id2 = StopCode::new("01012");
        let id3 = id1.clone();

        assert_eq!(id1, id2);
        assert_eq!(id1, id3);
        assert!(Arc::ptr_eq(&id1.0, &id3.0));
    }

    #[test]
    fn test_identifier_hash() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(StationName::new("bugis"), 42);

        assert_eq!(map.get(&StationName::new("bugis")), Some(&42));
    }

    #[test]
    fn test_identifier_display() {
        let id = ServiceNumber::new("174e");
        assert_eq!(format!("{}", id), "174e");
    }

    #[test]
    fn test_leading_zeros_preserved() {
        // Stop codes are labels, not numbers.
        let code: StopCode = String::from("01019").into();
        assert_eq!(code.as_str(), "01019");
        assert_ne!(code, StopCode::new("1019"));
    }
}
