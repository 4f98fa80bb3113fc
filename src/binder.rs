//! Property catalog binding.
//!
//! Turns the parser's unresolved tree into the typed AST: identifiers become
//! `Column`s with a fixed ordinal class, literals become `CardValue`s typed
//! by the column they compare against, PLVs and THIS CARD resolve to values
//! while keeping their provenance for regeneration and the analyzers.

use crate::ast::{
    AggregateFunc, CardValue, Column, ColumnSource, Condition, OrdinalClass, Query, Rhs,
    SelectItem, SortOrder,
};
use crate::catalog::{ContentProvider, PropertyCatalog, PropertySource, PropertyType};
use crate::error::{MqlError, MqlResult};
use crate::parser::{ParsedCondition, ParsedQuery, ParsedRhs, ParsedSelect};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

pub(crate) struct BindContext<'a> {
    pub catalog: &'a PropertyCatalog,
    pub content_provider: &'a ContentProvider,
    pub alert_sink: Option<&'a dyn Fn(&str)>,
}

/// Clause a column is being resolved for. `Project` is SELECT-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Usage {
    Select,
    Conditions,
    GroupBy,
    OrderBy,
}

impl Usage {
    fn clause_name(&self) -> &'static str {
        match self {
            Usage::Select => "SELECT",
            Usage::Conditions => "WHERE",
            Usage::GroupBy => "GROUP BY",
            Usage::OrderBy => "ORDER BY",
        }
    }
}

pub(crate) fn bind_query(parsed: &ParsedQuery, ctx: &BindContext) -> MqlResult<Query> {
    bind_query_inner(parsed, ctx, false)
}

pub(crate) fn bind_conditions(
    parsed: &ParsedCondition,
    ctx: &BindContext,
) -> MqlResult<Condition> {
    bind_condition(parsed, ctx)
}

fn bind_query_inner(parsed: &ParsedQuery, ctx: &BindContext, nested: bool) -> MqlResult<Query> {
    if nested {
        if parsed.as_of.is_some() {
            return Err(MqlError::domain("AS OF is not supported in a nested IN clause"));
        }
        if !parsed.group_by.is_empty() {
            return Err(MqlError::domain(
                "GROUP BY is not supported in a nested IN clause",
            ));
        }
        if !parsed.order_by.is_empty() {
            return Err(MqlError::domain(
                "ORDER BY is not supported in a nested IN clause",
            ));
        }
        if parsed.select.len() != 1 {
            return Err(MqlError::domain(
                "A nested IN clause must select exactly one column",
            ));
        }
    }

    let from_tree = match parsed.from_trees.as_slice() {
        [] => None,
        [name] => match ctx.catalog.tree(name) {
            Some(tree) => Some(tree.name.clone()),
            None => return Err(MqlError::TreeNotExist(name.clone())),
        },
        _ => return Err(MqlError::MultipleTreesNotSupported),
    };

    let as_of = parsed
        .as_of
        .as_deref()
        .map(|raw| {
            parse_date(raw)
                .ok_or_else(|| MqlError::domain(format!("'{raw}' is not a valid AS OF date")))
        })
        .transpose()?;

    let mut columns = Vec::new();
    for item in &parsed.select {
        columns.push(match item {
            ParsedSelect::Property(name) => {
                SelectItem::Column(resolve_column(name, ctx, Usage::Select)?)
            }
            ParsedSelect::Aggregate { func, arg } => SelectItem::Aggregate {
                func: AggregateFunc::from_name(func)?,
                column: arg
                    .as_deref()
                    .map(|a| resolve_column(a, ctx, Usage::Select))
                    .transpose()?,
            },
        });
    }

    let group_by = parsed
        .group_by
        .iter()
        .map(|name| resolve_column(name, ctx, Usage::GroupBy))
        .collect::<MqlResult<Vec<_>>>()?;

    let order_by = parsed
        .order_by
        .iter()
        .map(|(name, order)| Ok((resolve_column(name, ctx, Usage::OrderBy)?, *order)))
        .collect::<MqlResult<Vec<(Column, SortOrder)>>>()?;

    let conditions = parsed
        .conditions
        .as_ref()
        .map(|c| bind_condition(c, ctx))
        .transpose()?;

    Ok(Query {
        columns,
        explicit_columns: !parsed.select.is_empty(),
        distinct: parsed.distinct,
        conditions,
        group_by,
        order_by,
        as_of,
        from_tree,
    })
}

fn bind_condition(parsed: &ParsedCondition, ctx: &BindContext) -> MqlResult<Condition> {
    Ok(match parsed {
        ParsedCondition::And(xs) => Condition::And(
            xs.iter()
                .map(|x| bind_condition(x, ctx))
                .collect::<MqlResult<_>>()?,
        ),
        ParsedCondition::Or(xs) => Condition::Or(
            xs.iter()
                .map(|x| bind_condition(x, ctx))
                .collect::<MqlResult<_>>()?,
        ),
        ParsedCondition::Not(x) => Condition::Not(Box::new(bind_condition(x, ctx)?)),
        ParsedCondition::Comparison { property, op, rhs } => {
            let column = resolve_column(property, ctx, Usage::Conditions)?;
            let rhs = bind_rhs(&column, rhs, ctx)?;
            Condition::Comparison {
                column,
                op: *op,
                rhs,
            }
        }
        ParsedCondition::IsNull { property, negated } => Condition::IsNull {
            column: resolve_column(property, ctx, Usage::Conditions)?,
            negated: *negated,
        },
        ParsedCondition::TaggedWith { tag, negated } => Condition::TaggedWith {
            tag: tag.clone(),
            negated: *negated,
        },
        ParsedCondition::InList { property, values } => {
            let column = resolve_column(property, ctx, Usage::Conditions)?;
            let values = values
                .iter()
                .map(|v| type_value(&column, v, ctx))
                .collect::<MqlResult<Vec<_>>>()?;
            Condition::InList { column, values }
        }
        ParsedCondition::InSubquery {
            property,
            query,
            numbers,
        } => {
            let column = resolve_column(property, ctx, Usage::Conditions)?;
            let nested = bind_query_inner(query, ctx, true)?;
            Condition::InSubquery {
                column,
                query: Box::new(nested),
                numbers: *numbers,
            }
        }
        ParsedCondition::NumbersInList { property, numbers } => {
            let column = resolve_column(property, ctx, Usage::Conditions)?;
            let numbers = numbers
                .iter()
                .map(|n| {
                    n.parse::<i64>().map_err(|_| {
                        MqlError::domain(format!("'{n}' is not a valid card number"))
                    })
                })
                .collect::<MqlResult<Vec<_>>>()?;
            Condition::NumbersInList { column, numbers }
        }
        ParsedCondition::InPlan { plan } => {
            if ctx.catalog.resolve_plan(plan).is_none() {
                return Err(MqlError::domain(format!("Plan '{plan}' does not exist")));
            }
            Condition::InPlan { plan: plan.clone() }
        }
    })
}

fn bind_rhs(column: &Column, rhs: &ParsedRhs, ctx: &BindContext) -> MqlResult<Rhs> {
    Ok(match rhs {
        ParsedRhs::Literal(raw) => Rhs::Value(type_value(column, raw, ctx)?),
        // `= NULL` is normalized away by the parser.
        ParsedRhs::Null => Rhs::Value(CardValue::Null),
        ParsedRhs::Today => Rhs::Today,
        ParsedRhs::CurrentUser => Rhs::CurrentUser,
        ParsedRhs::Property(name) => {
            Rhs::Property(resolve_column(name, ctx, Usage::Conditions)?)
        }
        ParsedRhs::CardNumber(raw) => {
            let number = raw
                .parse::<i64>()
                .map_err(|_| MqlError::domain(format!("'{raw}' is not a valid card number")))?;
            Rhs::Value(CardValue::CardNumber(number))
        }
        ParsedRhs::Plv(name) => bind_plv(column, name, ctx)?,
        ParsedRhs::ThisCard(property) => bind_this_card(column, property.as_deref(), ctx)?,
    })
}

fn bind_plv(column: &Column, name: &str, ctx: &BindContext) -> MqlResult<Rhs> {
    let Some(plv) = ctx.catalog.resolve_plv(name) else {
        return Err(MqlError::domain(format!(
            "Project variable ({name}) does not exist"
        )));
    };

    let associated = column
        .property_id
        .map(|id| plv.applicable_property_ids.contains(&id))
        .unwrap_or(false);
    if !associated {
        return Err(MqlError::domain(format!(
            "Project variable ({}) is not associated with property '{}'",
            plv.name, column.name
        )));
    }

    let value = type_value(column, &plv.value, ctx)?;
    Ok(Rhs::Plv {
        name: plv.name.clone(),
        value,
    })
}

fn bind_this_card(
    column: &Column,
    property: Option<&str>,
    ctx: &BindContext,
) -> MqlResult<Rhs> {
    let card = match ctx.content_provider {
        ContentProvider::Page | ContentProvider::PageVersion => {
            return Err(MqlError::domain("THIS CARD is not supported for page macros"));
        }
        ContentProvider::None | ContentProvider::CardDefaults => {
            let display = match property {
                Some(p) => format!("THIS CARD.{p}"),
                None => "THIS CARD".to_string(),
            };
            if let Some(sink) = ctx.alert_sink {
                sink(&format!(
                    "{display} will be evaluated when the card is saved"
                ));
            }
            return Ok(Rhs::ThisCard {
                property: property.map(str::to_string),
                value: CardValue::Null,
            });
        }
        ContentProvider::Card(card) | ContentProvider::CardVersion(card) => card,
    };

    if !card.project.eq_ignore_ascii_case(&ctx.catalog.project) {
        return Err(MqlError::domain(
            "THIS CARD cannot reference a card from another project",
        ));
    }

    let value = match property {
        None => CardValue::CardNumber(card.number),
        Some(p) => {
            // The named property must exist even when the card has no value.
            resolve_column(p, ctx, Usage::Conditions)?;
            let value = card.property_value(p).cloned().unwrap_or(CardValue::Null);
            if !value.is_null() && !value_matches_class(column.ordinal_class, &value) {
                return Err(MqlError::domain(format!(
                    "THIS CARD.{p} value '{}' cannot be compared with property '{}'",
                    raw_text(&value),
                    column.name
                )));
            }
            value
        }
    };

    Ok(Rhs::ThisCard {
        property: property.map(str::to_string),
        value,
    })
}

/// Resolve an identifier to a typed column. Predefined properties win over
/// user-defined ones.
fn resolve_column(name: &str, ctx: &BindContext, usage: Usage) -> MqlResult<Column> {
    let predefined =
        |display: &str, physical: &str, class: OrdinalClass, prop_type: PropertyType| Column {
            name: display.to_string(),
            column_name: physical.to_string(),
            source: ColumnSource::Predefined,
            ordinal_class: class,
            prop_type,
            property_id: None,
        };

    match name.to_lowercase().as_str() {
        "number" => {
            return Ok(predefined(
                "Number",
                "number",
                OrdinalClass::Numeric,
                PropertyType::Numeric,
            ));
        }
        "name" => {
            return Ok(predefined("Name", "name", OrdinalClass::Text, PropertyType::Text));
        }
        "type" => {
            return Ok(predefined(
                "Type",
                "card_type_name",
                OrdinalClass::CardType,
                PropertyType::CardType,
            ));
        }
        "project" => {
            if usage != Usage::Select {
                return Err(MqlError::domain(format!(
                    "Project cannot be used in the {} clause",
                    usage.clause_name()
                )));
            }
            return Ok(predefined(
                "Project",
                "project",
                OrdinalClass::Text,
                PropertyType::Text,
            ));
        }
        "created by" => {
            return Ok(predefined(
                "Created by",
                "created_by",
                OrdinalClass::User,
                PropertyType::User,
            ));
        }
        "modified by" => {
            return Ok(predefined(
                "Modified by",
                "modified_by",
                OrdinalClass::User,
                PropertyType::User,
            ));
        }
        "created on" => {
            return Ok(predefined(
                "Created on",
                "created_at",
                OrdinalClass::Date,
                PropertyType::Date,
            ));
        }
        "modified on" => {
            return Ok(predefined(
                "Modified on",
                "updated_at",
                OrdinalClass::Date,
                PropertyType::Date,
            ));
        }
        _ => {}
    }

    let Some(def) = ctx.catalog.resolve_property(name) else {
        // A property name colliding with a keyword reached us unquoted.
        if name
            .split_whitespace()
            .any(crate::parser::grammar::base::is_keyword)
        {
            return Err(MqlError::Parse(format!(
                "'{name}' is a reserved keyword. Surround it with quotes to use it as a \
                 property name"
            )));
        }
        return Err(MqlError::PropertyNotExist {
            property: name.to_string(),
            suggestion: ctx.catalog.suggest_property(name),
        });
    };

    let source = match def.source {
        PropertySource::UserDefined => ColumnSource::UserDefined,
        PropertySource::Formula => ColumnSource::Formula,
        PropertySource::CardRelationship => ColumnSource::CardRelationship,
        PropertySource::TreeRelationship { .. } => ColumnSource::TreeRelationship,
    };

    let ordinal_class = if def.is_relationship() || def.prop_type == PropertyType::Card {
        OrdinalClass::CardRelationship
    } else if def.is_managed() {
        OrdinalClass::Enumerated
    } else {
        match def.prop_type {
            PropertyType::Numeric => OrdinalClass::Numeric,
            PropertyType::Text => OrdinalClass::Text,
            PropertyType::Date => OrdinalClass::Date,
            PropertyType::User => OrdinalClass::User,
            PropertyType::Card => OrdinalClass::CardRelationship,
            PropertyType::CardType => OrdinalClass::CardType,
        }
    };

    Ok(Column {
        name: def.name.clone(),
        column_name: def.column_name.clone(),
        source,
        ordinal_class,
        prop_type: def.prop_type,
        property_id: Some(def.id),
    })
}

/// Type a raw literal by the column it compares against.
fn type_value(column: &Column, raw: &str, ctx: &BindContext) -> MqlResult<CardValue> {
    match column.ordinal_class {
        OrdinalClass::Numeric => Decimal::from_str(raw.trim())
            .map(CardValue::Number)
            .map_err(|_| {
                MqlError::domain(format!(
                    "'{raw}' is not a valid numeric value for property '{}'",
                    column.name
                ))
            }),
        OrdinalClass::Enumerated => {
            let def = ctx.catalog.resolve_property(&column.name);
            let canonical = def.and_then(|d| {
                d.enum_values
                    .iter()
                    .find(|v| v.value.eq_ignore_ascii_case(raw))
                    .map(|v| v.value.clone())
            });
            match canonical {
                Some(value) => Ok(CardValue::Text(value)),
                None => Err(MqlError::domain(format!(
                    "'{raw}' is not a valid value for property '{}'",
                    column.name
                ))),
            }
        }
        OrdinalClass::Date => parse_date(raw).map(CardValue::Date).ok_or_else(|| {
            MqlError::domain(format!(
                "'{raw}' is not a valid date value for property '{}'",
                column.name
            ))
        }),
        OrdinalClass::User => Ok(CardValue::User(raw.to_string())),
        OrdinalClass::CardRelationship => Ok(CardValue::Text(raw.to_string())),
        OrdinalClass::CardType => {
            match ctx.catalog.card_type_position(raw) {
                Some(pos) => Ok(CardValue::Text(ctx.catalog.card_types()[pos].clone())),
                None => Err(MqlError::domain(format!("'{raw}' is not a valid card type"))),
            }
        }
        OrdinalClass::Text => Ok(CardValue::Text(raw.to_string())),
    }
}

fn value_matches_class(class: OrdinalClass, value: &CardValue) -> bool {
    match class {
        OrdinalClass::Numeric => matches!(value, CardValue::Number(_)),
        OrdinalClass::Enumerated => {
            matches!(value, CardValue::Text(_) | CardValue::Number(_))
        }
        OrdinalClass::Date => matches!(value, CardValue::Date(_)),
        OrdinalClass::User => matches!(value, CardValue::User(_) | CardValue::Text(_)),
        OrdinalClass::CardRelationship => {
            matches!(value, CardValue::CardNumber(_) | CardValue::Text(_))
        }
        OrdinalClass::CardType | OrdinalClass::Text => matches!(value, CardValue::Text(_)),
    }
}

fn raw_text(value: &CardValue) -> String {
    match value {
        CardValue::Null => "NULL".to_string(),
        CardValue::Number(n) => n.to_string(),
        CardValue::Text(s) | CardValue::User(s) => s.clone(),
        CardValue::Date(d) => d.format("%d %b %Y").to_string(),
        CardValue::CardNumber(n) => n.to_string(),
    }
}

/// Accepted date formats: the project display format plus ISO and US forms.
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    const FORMATS: &[&str] = &["%d %b %Y", "%Y-%m-%d", "%m/%d/%Y"];
    FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw.trim(), f).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::try_parse;

    fn error_of(text: &str) -> String {
        try_parse(text).unwrap_err().to_string()
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2010, 8, 6).unwrap();
        assert_eq!(parse_date("06 Aug 2010"), Some(expected));
        assert_eq!(parse_date("2010-08-06"), Some(expected));
        assert_eq!(parse_date("08/06/2010"), Some(expected));
        assert_eq!(parse_date("sometime"), None);
    }

    #[test]
    fn test_unknown_property_suggests_closest_name() {
        assert_eq!(
            error_of("statsu = Open"),
            "Card property 'statsu' does not exist! Did you mean 'Status'?"
        );
        assert_eq!(
            error_of("wibble = 1"),
            "Card property 'wibble' does not exist!"
        );
    }

    #[test]
    fn test_keyword_property_gets_quoting_hint() {
        let message = error_of("SELECT Name WHERE order = 1");
        assert!(message.contains("reserved keyword"), "got: {message}");
        assert!(message.contains("quotes"), "got: {message}");
    }

    #[test]
    fn test_predefined_properties_resolve_first() {
        let query = crate::testkit::parse("SELECT Number, Name, Type");
        assert_eq!(query.ast().columns.len(), 3);
    }

    #[test]
    fn test_project_is_select_only() {
        assert!(try_parse("SELECT Project").is_ok());
        assert_eq!(
            error_of("Project = 'scrum'"),
            "Project cannot be used in the WHERE clause"
        );
        assert_eq!(
            error_of("SELECT Name ORDER BY Project"),
            "Project cannot be used in the ORDER BY clause"
        );
    }

    #[test]
    fn test_literal_typing_errors_name_the_value_and_property() {
        assert_eq!(
            error_of("Size = abc"),
            "'abc' is not a valid numeric value for property 'Size'"
        );
        assert_eq!(
            error_of("Status = 'Wat'"),
            "'Wat' is not a valid value for property 'Status'"
        );
        assert_eq!(
            error_of("'Due Date' = 'sometime'"),
            "'sometime' is not a valid date value for property 'Due Date'"
        );
        assert_eq!(error_of("Type = Wibble"), "'Wibble' is not a valid card type");
    }

    #[test]
    fn test_enum_values_canonicalize_case() {
        let query = crate::testkit::parse("Status = open");
        assert_eq!(query.to_string(), "Status = 'Open'");
    }

    #[test]
    fn test_plv_resolution_and_association() {
        assert!(try_parse("Release = (current release)").is_ok());
        assert!(try_parse("Status = (favorite status)").is_ok());
        assert_eq!(
            error_of("Status = (nope)"),
            "Project variable (nope) does not exist"
        );
        assert_eq!(
            error_of("Status = (current release)"),
            "Project variable (current release) is not associated with property 'Status'"
        );
    }

    #[test]
    fn test_tree_resolution() {
        assert!(try_parse("SELECT Name FROM TREE 'Planning'").is_ok());
        assert_eq!(
            error_of("SELECT Name FROM TREE 'Nope'"),
            "Tree 'Nope' does not exist!"
        );
        assert_eq!(
            error_of("SELECT Name FROM TREE 'Planning', 'Nope'"),
            "Only one tree can be specified in the FROM TREE clause"
        );
    }

    #[test]
    fn test_plan_resolution() {
        assert!(try_parse("IN PLAN 'Q3 Launch'").is_ok());
        assert_eq!(error_of("IN PLAN 'Nope'"), "Plan 'Nope' does not exist");
    }

    #[test]
    fn test_invalid_card_number_tokens() {
        assert_eq!(
            error_of("Dependency = NUMBER x1"),
            "'x1' is not a valid card number"
        );
        assert_eq!(
            error_of("Dependency NUMBERS IN (1, x)"),
            "'x' is not a valid card number"
        );
    }

    #[test]
    fn test_invalid_as_of_date() {
        assert_eq!(
            error_of("SELECT Name AS OF 'sometime'"),
            "'sometime' is not a valid AS OF date"
        );
    }
}
