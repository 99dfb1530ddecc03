//! Interned-by-refcount identifiers

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

/// A method, variable, constant or type-parameter name
///
/// Cloning is a refcount bump; names are shared freely between the syntax
/// tree, entity tables and types.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Name(Rc<str>);

impl Name {
    pub fn new(s: &str) -> Self {
        Name(Rc::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `@foo` for an attribute named `foo`
    pub fn ivar_for(attr: &str) -> Self {
        Name::new(&format!("@{attr}"))
    }

    /// `foo=` for an attribute named `foo`
    pub fn setter_for(attr: &str) -> Self {
        Name::new(&format!("{attr}="))
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::new(s)
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name(Rc::from(s))
    }
}

impl From<Name> for String {
    fn from(n: Name) -> Self {
        n.0.to_string()
    }
}

impl Deref for Name {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

/// Build a `Vec<Name>` path from string segments
pub fn path(segments: &[&str]) -> Vec<Name> {
    segments.iter().map(|s| Name::new(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn test_lookup_by_str() {
        let mut map = IndexMap::new();
        map.insert(Name::new("foo"), 1);
        assert_eq!(map.get("foo"), Some(&1));
    }

    #[test]
    fn test_accessor_names() {
        assert_eq!(Name::ivar_for("count"), "@count");
        assert_eq!(Name::setter_for("count"), "count=");
    }

    #[test]
    fn test_derefs_to_str() {
        let n = Name::new("size=");
        assert!(n.ends_with('='));
        assert_eq!(n.len(), 5);
    }

    #[test]
    fn test_serde_as_string() {
        let n: Name = serde_json::from_str("\"bar\"").unwrap();
        assert_eq!(n.as_str(), "bar");
        assert_eq!(serde_json::to_string(&n).unwrap(), "\"bar\"");
    }
}
