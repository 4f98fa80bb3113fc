//! Shared test fixtures: a representative catalog snapshot and parse
//! helpers used across the module test suites.

use crate::catalog::{
    EnumValue, NamedId, PlvDef, PropertyCatalog, PropertyDef, PropertySource, PropertyType,
    TreeDef,
};
use crate::engine::{CardQuery, ParseOptions};
use crate::error::MqlResult;
use crate::transpiler::{CompileParams, Dialect};
use chrono::NaiveDate;
use std::sync::Arc;

pub(crate) fn catalog() -> PropertyCatalog {
    let prop = |id: i64,
                name: &str,
                column_name: &str,
                prop_type: PropertyType,
                source: PropertySource| PropertyDef {
        id,
        name: name.to_string(),
        column_name: column_name.to_string(),
        prop_type,
        enum_values: Vec::new(),
        source,
        applicable_types: None,
    };
    let values = |raw: &[(&str, i32)]| {
        raw.iter()
            .map(|(value, position)| EnumValue {
                value: value.to_string(),
                position: *position,
            })
            .collect::<Vec<_>>()
    };

    let mut status = prop(1, "Status", "cp_status", PropertyType::Text, PropertySource::UserDefined);
    status.enum_values = values(&[("New", 1), ("Open", 2), ("Closed", 3)]);

    // Managed numeric list whose position order differs from value order.
    let mut release = prop(
        8,
        "Release",
        "cp_release",
        PropertyType::Numeric,
        PropertySource::UserDefined,
    );
    release.enum_values = values(&[("3", 1), ("1", 2), ("2", 3)]);

    PropertyCatalog {
        project: "scrum".to_string(),
        properties: vec![
            status,
            prop(2, "Size", "cp_size", PropertyType::Numeric, PropertySource::UserDefined),
            prop(3, "Estimate", "cp_estimate", PropertyType::Numeric, PropertySource::Formula),
            prop(4, "Due Date", "cp_due_date", PropertyType::Date, PropertySource::UserDefined),
            prop(5, "Owner", "cp_owner", PropertyType::User, PropertySource::UserDefined),
            prop(
                6,
                "Dependency",
                "cp_dependency",
                PropertyType::Card,
                PropertySource::CardRelationship,
            ),
            prop(7, "Iteration", "cp_iteration", PropertyType::Numeric, PropertySource::UserDefined),
            release,
            prop(
                9,
                "Planning release",
                "cp_planning_release",
                PropertyType::Card,
                PropertySource::TreeRelationship {
                    tree: "Planning".to_string(),
                },
            ),
        ],
        card_types: vec!["Story".to_string(), "Bug".to_string(), "Epic".to_string()],
        trees: vec![TreeDef {
            id: 7,
            name: "Planning".to_string(),
            relationship_properties: vec!["Planning release".to_string()],
        }],
        plvs: vec![
            PlvDef {
                name: "current release".to_string(),
                data_type: PropertyType::Numeric,
                value: "2".to_string(),
                applicable_property_ids: vec![8],
            },
            PlvDef {
                name: "favorite status".to_string(),
                data_type: PropertyType::Text,
                value: "Open".to_string(),
                applicable_property_ids: vec![1],
            },
        ],
        tags: vec![
            NamedId {
                id: 11,
                name: "rss".to_string(),
            },
            NamedId {
                id: 12,
                name: "urgent".to_string(),
            },
        ],
        plans: vec![NamedId {
            id: 5,
            name: "Q3 Launch".to_string(),
        }],
    }
}

pub(crate) fn catalog_arc() -> Arc<PropertyCatalog> {
    Arc::new(catalog())
}

pub(crate) fn parse(text: &str) -> CardQuery {
    try_parse(text).expect("query should parse")
}

pub(crate) fn try_parse(text: &str) -> MqlResult<CardQuery> {
    CardQuery::parse(text, catalog_arc(), ParseOptions::default())
}

/// Fixed clock: compilation takes `now` explicitly, so tests pin it.
pub(crate) fn params() -> CompileParams {
    let now = NaiveDate::from_ymd_opt(2010, 8, 6)
        .expect("valid date")
        .and_hms_opt(12, 0, 0)
        .expect("valid time");
    CompileParams::new(Dialect::Postgres, now)
}
