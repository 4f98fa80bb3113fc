//! The per-project property catalog consumed by the compiler.
//!
//! A catalog is an immutable snapshot of the project's metadata: property
//! definitions, card types in position order, enumeration values, tree
//! definitions, project-level variables, tags and plans. The compiler binds
//! against exactly one snapshot per compilation and never re-reads it
//! mid-evaluation.

use crate::ast::CardValue;
use serde::{Deserialize, Serialize};
use strsim::levenshtein;

/// The data type of a card property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyType {
    /// Numeric free text or managed numeric list.
    Numeric,
    /// Plain or managed text.
    Text,
    Date,
    User,
    /// A reference to another card, compared by name, number or NUMBERS IN.
    Card,
    /// The predefined `Type` column.
    CardType,
}

/// Where a property's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertySource {
    UserDefined,
    Formula,
    CardRelationship,
    /// A relationship column belonging to the named tree.
    TreeRelationship { tree: String },
}

/// One value of a managed enumeration, ordered by `position` (not by text).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub value: String,
    pub position: i32,
}

/// A user-defined property definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Stable id, referenced by the `enumeration_values` join.
    pub id: i64,
    /// Display name. Lookup is case-insensitive.
    pub name: String,
    /// Physical column on the cards / card_versions tables.
    pub column_name: String,
    pub prop_type: PropertyType,
    /// Managed properties carry an explicitly ordered value list.
    #[serde(default)]
    pub enum_values: Vec<EnumValue>,
    pub source: PropertySource,
    /// Card types this property applies to. `None` means all.
    #[serde(default)]
    pub applicable_types: Option<Vec<String>>,
}

impl PropertyDef {
    /// Managed enumerations compare by catalog position, not value text.
    pub fn is_managed(&self) -> bool {
        !self.enum_values.is_empty()
    }

    pub fn is_formula(&self) -> bool {
        self.source == PropertySource::Formula
    }

    pub fn is_relationship(&self) -> bool {
        matches!(
            self.source,
            PropertySource::CardRelationship | PropertySource::TreeRelationship { .. }
        )
    }

    /// Position of a value within the managed ordering, if any.
    pub fn position_of(&self, value: &str) -> Option<i32> {
        self.enum_values
            .iter()
            .find(|v| v.value.eq_ignore_ascii_case(value))
            .map(|v| v.position)
    }
}

/// A tree definition: the materialized hierarchy FROM TREE scopes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeDef {
    pub id: i64,
    pub name: String,
    /// Relationship property names in parent-to-child order.
    #[serde(default)]
    pub relationship_properties: Vec<String>,
}

/// A project-level variable: a named, typed constant scoped to a subset of
/// properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlvDef {
    pub name: String,
    pub data_type: PropertyType,
    pub value: String,
    /// Property ids this variable may be compared against.
    #[serde(default)]
    pub applicable_property_ids: Vec<i64>,
}

/// A named tag or plan resolvable at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedId {
    pub id: i64,
    pub name: String,
}

/// Immutable per-project catalog snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyCatalog {
    /// Project identifier, used to reject cross-project THIS CARD contexts.
    pub project: String,
    pub properties: Vec<PropertyDef>,
    /// Card type names in position order.
    pub card_types: Vec<String>,
    #[serde(default)]
    pub trees: Vec<TreeDef>,
    #[serde(default)]
    pub plvs: Vec<PlvDef>,
    #[serde(default)]
    pub tags: Vec<NamedId>,
    #[serde(default)]
    pub plans: Vec<NamedId>,
}

impl PropertyCatalog {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Default::default()
        }
    }

    /// Case-insensitive property lookup.
    pub fn resolve_property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Ordered card type list. Ordinal `Type` comparisons use this order.
    pub fn card_types(&self) -> &[String] {
        &self.card_types
    }

    /// Position of a card type name, if the project defines it.
    pub fn card_type_position(&self, name: &str) -> Option<usize> {
        self.card_types
            .iter()
            .position(|t| t.eq_ignore_ascii_case(name))
    }

    pub fn enumeration_values(&self, property: &str) -> &[EnumValue] {
        self.resolve_property(property)
            .map(|p| p.enum_values.as_slice())
            .unwrap_or(&[])
    }

    pub fn tree(&self, name: &str) -> Option<&TreeDef> {
        self.trees.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Case-insensitive PLV lookup.
    pub fn resolve_plv(&self, name: &str) -> Option<&PlvDef> {
        self.plvs.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Tags are opaque names resolved to ids; unknown tags are not an error
    /// (the generator degrades them to an always-false branch).
    pub fn resolve_tag(&self, name: &str) -> Option<i64> {
        self.tags
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .map(|t| t.id)
    }

    pub fn resolve_plan(&self, name: &str) -> Option<i64> {
        self.plans
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.id)
    }

    /// Find the closest property name within a Levenshtein threshold.
    pub fn suggest_property(&self, input: &str) -> Option<String> {
        let mut best: Option<(usize, &str)> = None;
        for prop in &self.properties {
            let dist = levenshtein(&input.to_lowercase(), &prop.name.to_lowercase());
            let threshold = match input.len() {
                0..=2 => 0,
                3..=5 => 2,
                _ => 3,
            };
            if dist <= threshold && best.map(|(d, _)| dist < d).unwrap_or(true) {
                best = Some((dist, &prop.name));
            }
        }
        best.map(|(_, name)| name.to_string())
    }
}

/// The card/version/defaults/page context THIS CARD resolves against.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ContentProvider {
    /// No context yet (card defaults, unsaved card). THIS CARD degrades to
    /// an advisory alert plus a null placeholder.
    #[default]
    None,
    Card(CardContext),
    CardVersion(CardContext),
    CardDefaults,
    Page,
    PageVersion,
}

/// A concrete card (or card version) supplying THIS CARD values at bind time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CardContext {
    pub number: i64,
    pub project: String,
    /// Property values keyed by lowercased property name.
    pub properties: std::collections::HashMap<String, CardValue>,
}

impl CardContext {
    pub fn property_value(&self, name: &str) -> Option<&CardValue> {
        self.properties.get(&name.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> PropertyCatalog {
        let mut c = PropertyCatalog::new("scrum");
        c.properties.push(PropertyDef {
            id: 1,
            name: "Status".to_string(),
            column_name: "cp_status".to_string(),
            prop_type: PropertyType::Text,
            enum_values: vec![
                EnumValue { value: "New".to_string(), position: 1 },
                EnumValue { value: "Open".to_string(), position: 2 },
                EnumValue { value: "Closed".to_string(), position: 3 },
            ],
            source: PropertySource::UserDefined,
            applicable_types: None,
        });
        c.card_types = vec!["Story".to_string(), "Bug".to_string()];
        c
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let c = catalog();
        assert!(c.resolve_property("status").is_some());
        assert!(c.resolve_property("STATUS").is_some());
        assert!(c.resolve_property("estimate").is_none());
    }

    #[test]
    fn test_suggest_property() {
        let c = catalog();
        assert_eq!(c.suggest_property("statsu"), Some("Status".to_string()));
        assert_eq!(c.suggest_property("zzz"), None);
    }

    #[test]
    fn test_enum_position_lookup() {
        let c = catalog();
        let p = c.resolve_property("Status").unwrap();
        assert!(p.is_managed());
        assert_eq!(p.position_of("open"), Some(2));
        assert_eq!(p.position_of("missing"), None);
    }

    #[test]
    fn test_card_type_position() {
        let c = catalog();
        assert_eq!(c.card_type_position("bug"), Some(1));
        assert_eq!(c.card_type_position("Epic"), None);
    }
}
