use crate::ast::AggregateFunc;
use crate::catalog::PropertyType;
use serde::{Deserialize, Serialize};

/// Where a resolved column came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnSource {
    Predefined,
    UserDefined,
    Formula,
    CardRelationship,
    TreeRelationship,
}

/// The comparison capability of a column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrdinalClass {
    /// Ordered numerically: size, numeric formulas, numeric free text.
    Numeric,
    /// Managed text/numeric enumerations, ordered by catalog position.
    Enumerated,
    Date,
    /// Equality and CURRENT USER only.
    User,
    /// Equality, IN, NUMBER and NUMBERS IN only.
    CardRelationship,
    /// The `Type` column, ordered by card-type position.
    CardType,
    /// Plain free text, equality only.
    Text,
}

impl OrdinalClass {
    pub fn supports_ordering(&self) -> bool {
        matches!(
            self,
            OrdinalClass::Numeric
                | OrdinalClass::Enumerated
                | OrdinalClass::Date
                | OrdinalClass::CardType
        )
    }
}

/// A column resolved against the catalog snapshot. Its type is fixed for
/// the lifetime of the query evaluation that bound it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Canonical display name from the catalog ("Status", "Number").
    pub name: String,
    /// Physical column on the row source ("cp_status", "number").
    pub column_name: String,
    pub source: ColumnSource,
    pub ordinal_class: OrdinalClass,
    /// Underlying data type. An Enumerated column is still numeric- or
    /// text-valued underneath; aggregation and casting depend on this.
    pub prop_type: PropertyType,
    /// Property definition id for user-defined columns; drives the
    /// enumeration-values join and PLV association checks.
    pub property_id: Option<i64>,
}

impl Column {
    /// The predefined Number column, used for implicit selection and
    /// stable-ordering injection.
    pub fn predefined_number() -> Self {
        Column {
            name: "Number".to_string(),
            column_name: "number".to_string(),
            source: ColumnSource::Predefined,
            ordinal_class: OrdinalClass::Numeric,
            prop_type: PropertyType::Numeric,
            property_id: None,
        }
    }

    pub fn predefined_name() -> Self {
        Column {
            name: "Name".to_string(),
            column_name: "name".to_string(),
            source: ColumnSource::Predefined,
            ordinal_class: OrdinalClass::Text,
            prop_type: PropertyType::Text,
            property_id: None,
        }
    }

    pub fn predefined_modified_on() -> Self {
        Column {
            name: "Modified on".to_string(),
            column_name: "updated_at".to_string(),
            source: ColumnSource::Predefined,
            ordinal_class: OrdinalClass::Date,
            prop_type: PropertyType::Date,
            property_id: None,
        }
    }

    pub fn is_managed(&self) -> bool {
        self.ordinal_class == OrdinalClass::Enumerated
    }

    pub fn is_relationship(&self) -> bool {
        self.ordinal_class == OrdinalClass::CardRelationship
    }

    pub fn is_numeric(&self) -> bool {
        self.ordinal_class == OrdinalClass::Numeric
    }

    /// Aggregatable columns are numeric-valued, whatever their ordering.
    pub fn is_numeric_valued(&self) -> bool {
        self.prop_type == PropertyType::Numeric
    }

    /// Predefined Number column?
    pub fn is_card_number(&self) -> bool {
        self.source == ColumnSource::Predefined && self.column_name == "number"
    }

    /// Predefined Name column?
    pub fn is_card_name(&self) -> bool {
        self.source == ColumnSource::Predefined && self.column_name == "name"
    }

    pub fn is_card_type(&self) -> bool {
        self.ordinal_class == OrdinalClass::CardType
    }

    /// Canonical MQL spelling, quoted when the bare form would not re-parse.
    pub fn mql_name(&self) -> String {
        let needs_quotes = self
            .name
            .chars()
            .any(|c| !c.is_alphanumeric() && c != '_');
        if needs_quotes {
            format!("'{}'", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// One entry of the SELECT clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    Column(Column),
    /// Aggregate over a column, or over `*` (COUNT only).
    Aggregate {
        func: AggregateFunc,
        column: Option<Column>,
    },
}

impl SelectItem {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, SelectItem::Aggregate { .. })
    }

    /// Lowercased display label, used as the SQL alias and result key.
    pub fn label(&self) -> String {
        match self {
            SelectItem::Column(c) => c.name.to_lowercase(),
            SelectItem::Aggregate { func, column } => {
                let arg = column
                    .as_ref()
                    .map(|c| c.name.to_lowercase())
                    .unwrap_or_else(|| "*".to_string());
                format!("{}({})", func.to_string().to_lowercase(), arg)
            }
        }
    }
}

impl std::fmt::Display for SelectItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectItem::Column(c) => write!(f, "{}", c.mql_name()),
            SelectItem::Aggregate { func, column } => match column {
                Some(c) => write!(f, "{}({})", func, c.mql_name()),
                None => write!(f, "{}(*)", func),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> Column {
        Column {
            name: "Status".to_string(),
            column_name: "cp_status".to_string(),
            source: ColumnSource::UserDefined,
            ordinal_class: OrdinalClass::Enumerated,
            prop_type: PropertyType::Text,
            property_id: Some(1),
        }
    }

    #[test]
    fn test_select_item_label() {
        assert_eq!(SelectItem::Column(status()).label(), "status");
        let agg = SelectItem::Aggregate {
            func: AggregateFunc::Sum,
            column: Some(status()),
        };
        assert_eq!(agg.label(), "sum(status)");
        let star = SelectItem::Aggregate {
            func: AggregateFunc::Count,
            column: None,
        };
        assert_eq!(star.label(), "count(*)");
    }

    #[test]
    fn test_mql_name_quotes_long_names() {
        let mut c = status();
        c.name = "Release Date".to_string();
        assert_eq!(c.mql_name(), "'Release Date'");
        assert_eq!(status().mql_name(), "Status");
    }

    #[test]
    fn test_ordering_support() {
        assert!(OrdinalClass::Numeric.supports_ordering());
        assert!(OrdinalClass::CardType.supports_ordering());
        assert!(!OrdinalClass::User.supports_ordering());
        assert!(!OrdinalClass::Text.supports_ordering());
    }
}
