use std::fmt;

use serde::{Deserialize, Serialize};

/// Entity kinds addressable in the semantic model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Module,
    Type,
    Routine,
    Attribute,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Type => "type",
            Self::Routine => "routine",
            Self::Attribute => "attr",
        }
    }
}

/// Stable, deterministic entity identifier.
///
/// The textual form is `<kind>:<file>:<qualified-name>` with an optional
/// `:<ordinal>` disambiguator, so identical inputs always produce identical
/// identifiers across runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(kind: EntityKind, file: &str, qualified: &str) -> Self {
        Self(format!("{}:{}:{}", kind.as_str(), file, qualified))
    }

    /// Deterministic collision suffix: the ordinal of the entity within its
    /// file, starting at 2 for the first duplicate.
    pub fn with_ordinal(&self, ordinal: usize) -> Self {
        Self(format!("{}:{}", self.0, ordinal))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> Option<EntityKind> {
        match self.0.split(':').next() {
            Some("module") => Some(EntityKind::Module),
            Some("type") => Some(EntityKind::Type),
            Some("routine") => Some(EntityKind::Routine),
            Some("attr") => Some(EntityKind::Attribute),
            _ => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reference that either points at a model entity or at the External
/// sentinel, preserving the unresolved textual form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityRef {
    Entity(EntityId),
    External(String),
}

impl EntityRef {
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }

    pub fn entity(&self) -> Option<&EntityId> {
        match self {
            Self::Entity(id) => Some(id),
            Self::External(_) => None,
        }
    }

    /// The serialised identifier string; External references use the
    /// `external:` prefix.
    pub fn id_string(&self) -> String {
        match self {
            Self::Entity(id) => id.as_str().to_string(),
            Self::External(text) => format!("external:{text}"),
        }
    }
}

impl Serialize for EntityRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.id_string())
    }
}

impl<'de> Deserialize<'de> for EntityRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.strip_prefix("external:") {
            Some(text) => Self::External(text.to_string()),
            None => Self::Entity(EntityId(raw)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_format_is_stable() {
        let id = EntityId::new(EntityKind::Type, "m/a.py", "m.a.A");
        assert_eq!(id.as_str(), "type:m/a.py:m.a.A");
        assert_eq!(id.with_ordinal(2).as_str(), "type:m/a.py:m.a.A:2");
        assert_eq!(id.kind(), Some(EntityKind::Type));
    }

    #[test]
    fn external_refs_round_trip() {
        let external = EntityRef::External("Foo".into());
        let json = serde_json::to_string(&external).unwrap();
        assert_eq!(json, "\"external:Foo\"");
        let back: EntityRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, external);
    }
}
