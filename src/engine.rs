//! Execution façade and result shaping.
//!
//! `CardQuery` runs the whole pipeline — parse, bind, validate, compile —
//! and executes through an externally supplied `ExecutionBackend`. Result
//! shaping is a pure transform over the returned row set.

use crate::ast::{CardValue, Column, Condition, Query, Rhs, SelectItem, SortOrder};
use crate::binder::{self, BindContext};
use crate::catalog::{ContentProvider, PropertyCatalog};
use crate::error::{MqlError, MqlResult};
use crate::transpiler::{CompileParams, CompiledSelect, build_select};
use crate::{analyzer, parser, validator};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// One result row as reported by the backend, keyed by result-column label.
pub type Row = HashMap<String, JsonValue>;

/// The relational engine the compiler hands generated SQL to. One statement
/// per logical operation; no batching, retry or timeout here.
pub trait ExecutionBackend {
    fn execute(&self, sql: &str) -> MqlResult<Vec<Row>>;
}

/// Options for `CardQuery::parse`.
#[derive(Default)]
pub struct ParseOptions<'a> {
    pub content_provider: ContentProvider,
    /// Advisory sink for deferred THIS CARD resolution; never fatal.
    pub alert_sink: Option<&'a dyn Fn(&str)>,
}

/// A parsed, bound and validated MQL query. Immutable: every derived query
/// (`restrict_with`, the re-selecting finders) is a new value.
#[derive(Clone, Debug)]
pub struct CardQuery {
    ast: Query,
    catalog: Arc<PropertyCatalog>,
    content_provider: ContentProvider,
}

/// A card in a result, identified the way the UI lists cards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardIdentifier {
    pub number: i64,
    pub name: String,
}

/// One group of `find_cards_ordered_by_property`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyGroup {
    pub value: Option<String>,
    /// Matching cards in the group; unaffected by any per-group limit.
    pub count: usize,
    pub cards: Vec<CardIdentifier>,
}

/// XML shape version for `values_for_macro`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V2,
}

/// The saved-filter representation used by non-MQL filter widgets.
#[derive(Debug, Clone, PartialEq)]
pub enum CardListView {
    Filters(Vec<FilterClause>),
    /// Shapes the widget cannot express degrade to a raw MQL filter.
    Mql(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub property: String,
    pub operator: FilterOp,
    /// `None` encodes the (not set) value.
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Is,
    IsNot,
}

impl CardQuery {
    /// Parse, bind and validate a complete MQL query against a catalog
    /// snapshot.
    pub fn parse(
        text: &str,
        catalog: Arc<PropertyCatalog>,
        options: ParseOptions<'_>,
    ) -> MqlResult<Self> {
        let parsed = parser::parse(text)?;
        let ctx = BindContext {
            catalog: &catalog,
            content_provider: &options.content_provider,
            alert_sink: options.alert_sink,
        };
        let ast = binder::bind_query(&parsed, &ctx)?;
        validator::validate(&ast)?;
        Ok(Self {
            ast,
            catalog,
            content_provider: options.content_provider,
        })
    }

    /// Parse in the condition-only context (saved filters, restrictions).
    pub fn parse_conditions(
        text: &str,
        catalog: Arc<PropertyCatalog>,
        options: ParseOptions<'_>,
    ) -> MqlResult<Self> {
        let parsed = parser::parse_conditions(text)?;
        let ctx = BindContext {
            catalog: &catalog,
            content_provider: &options.content_provider,
            alert_sink: options.alert_sink,
        };
        let conditions = parsed.map(|p| binder::bind_conditions(&p, &ctx)).transpose()?;
        let ast = Query {
            columns: Vec::new(),
            explicit_columns: false,
            distinct: false,
            conditions,
            group_by: Vec::new(),
            order_by: Vec::new(),
            as_of: None,
            from_tree: None,
        };
        validator::validate(&ast)?;
        Ok(Self {
            ast,
            catalog,
            content_provider: options.content_provider,
        })
    }

    pub fn ast(&self) -> &Query {
        &self.ast
    }

    pub fn catalog(&self) -> &PropertyCatalog {
        &self.catalog
    }

    /// A new query with `extra` conjoined onto the conditions. The receiver
    /// is untouched, so cached queries stay reusable.
    pub fn restrict_with(&self, extra: &str) -> MqlResult<Self> {
        let Some(parsed) = parser::parse_conditions(extra)? else {
            return Ok(self.clone());
        };
        let ctx = BindContext {
            catalog: &self.catalog,
            content_provider: &self.content_provider,
            alert_sink: None,
        };
        let condition = binder::bind_conditions(&parsed, &ctx)?;
        let ast = self.ast.restricted(condition);
        validator::validate(&ast)?;
        Ok(Self {
            ast,
            catalog: Arc::clone(&self.catalog),
            content_provider: self.content_provider.clone(),
        })
    }

    /// False iff any condition depends on CURRENT USER.
    pub fn can_be_cached(&self) -> bool {
        analyzer::can_be_cached(&self.ast)
    }

    pub fn to_sql(&self, params: &CompileParams) -> MqlResult<String> {
        self.compile(params).map(|c| c.sql)
    }

    fn compile(&self, params: &CompileParams) -> MqlResult<CompiledSelect> {
        let compiled = build_select(&self.ast, &self.catalog, params)?;
        debug!(sql = %compiled.sql, "compiled MQL query");
        Ok(compiled)
    }

    fn execute(
        &self,
        backend: &dyn ExecutionBackend,
        params: &CompileParams,
    ) -> MqlResult<(Vec<Row>, CompiledSelect)> {
        let compiled = self.compile(params)?;
        let rows = backend.execute(&compiled.sql)?;
        Ok((rows, compiled))
    }

    /// Execute and return the externally visible rows; implicitly injected
    /// columns (the stable-ordering Number) are dropped.
    pub fn values(
        &self,
        backend: &dyn ExecutionBackend,
        params: &CompileParams,
    ) -> MqlResult<Vec<Row>> {
        let (mut rows, compiled) = self.execute(backend, params)?;
        let implicit: Vec<&str> = compiled
            .columns
            .iter()
            .filter(|c| c.implicit)
            .map(|c| c.label.as_str())
            .collect();
        for row in &mut rows {
            for label in &implicit {
                row.remove(*label);
            }
        }
        Ok(rows)
    }

    /// Pairs of the first two selected columns, in row order.
    pub fn values_as_pairs(
        &self,
        backend: &dyn ExecutionBackend,
        params: &CompileParams,
    ) -> MqlResult<Vec<(JsonValue, JsonValue)>> {
        let (rows, compiled) = self.execute(backend, params)?;
        let visible = visible_labels(&compiled);
        let (first, second) = match visible.as_slice() {
            [a, b, ..] => (a.clone(), b.clone()),
            _ => {
                return Err(MqlError::domain(
                    "values_as_pairs requires at least two selected columns",
                ));
            }
        };
        Ok(rows
            .into_iter()
            .map(|mut row| {
                (
                    row.remove(&first).unwrap_or(JsonValue::Null),
                    row.remove(&second).unwrap_or(JsonValue::Null),
                )
            })
            .collect())
    }

    /// Numeric coordinates for charting: (label, decimal value) from the
    /// first two columns, skipping rows without a numeric second cell.
    pub fn values_as_coords(
        &self,
        backend: &dyn ExecutionBackend,
        params: &CompileParams,
    ) -> MqlResult<Vec<(String, Decimal)>> {
        let pairs = self.values_as_pairs(backend, params)?;
        Ok(pairs
            .into_iter()
            .filter_map(|(label, value)| {
                let y = cell_decimal(&value)?;
                Some((cell_string(&label).unwrap_or_default(), y))
            })
            .collect())
    }

    /// First cell of the first row.
    pub fn single_value(
        &self,
        backend: &dyn ExecutionBackend,
        params: &CompileParams,
    ) -> MqlResult<Option<String>> {
        let (rows, compiled) = self.execute(backend, params)?;
        let visible = visible_labels(&compiled);
        let Some(first) = visible.first() else {
            return Ok(None);
        };
        Ok(rows
            .first()
            .and_then(|row| row.get(first))
            .and_then(cell_string))
    }

    /// First column across all rows.
    pub fn single_values(
        &self,
        backend: &dyn ExecutionBackend,
        params: &CompileParams,
    ) -> MqlResult<Vec<String>> {
        let (rows, compiled) = self.execute(backend, params)?;
        let visible = visible_labels(&compiled);
        let Some(first) = visible.first() else {
            return Ok(Vec::new());
        };
        Ok(rows
            .iter()
            .filter_map(|row| row.get(first).and_then(cell_string))
            .collect())
    }

    /// The matching cards, re-selected as Number and Name over the same
    /// conditions.
    pub fn find_cards(
        &self,
        backend: &dyn ExecutionBackend,
        params: &CompileParams,
    ) -> MqlResult<Vec<CardIdentifier>> {
        let derived = self.ast.reselected(vec![
            SelectItem::Column(Column::predefined_number()),
            SelectItem::Column(Column::predefined_name()),
        ]);
        let compiled = build_select(&derived, &self.catalog, params)?;
        let rows = backend.execute(&compiled.sql)?;
        Ok(rows.iter().filter_map(row_card_identifier).collect())
    }

    /// The matching card numbers only.
    pub fn find_card_numbers(
        &self,
        backend: &dyn ExecutionBackend,
        params: &CompileParams,
    ) -> MqlResult<Vec<i64>> {
        let derived = self
            .ast
            .reselected(vec![SelectItem::Column(Column::predefined_number())]);
        let compiled = build_select(&derived, &self.catalog, params)?;
        let rows = backend.execute(&compiled.sql)?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("number").and_then(cell_i64))
            .collect())
    }

    /// Matching cards grouped by the first selected property value. Groups
    /// come back in most-recently-modified order; `limit` bounds the cards
    /// listed per group without changing the reported count.
    pub fn find_cards_ordered_by_property(
        &self,
        backend: &dyn ExecutionBackend,
        params: &CompileParams,
        limit: Option<usize>,
    ) -> MqlResult<Vec<PropertyGroup>> {
        let property = self
            .ast
            .non_aggregate_columns()
            .next()
            .cloned()
            .ok_or_else(|| {
                MqlError::domain("find_cards_ordered_by_property requires a selected property")
            })?;
        let label = property.name.to_lowercase();

        let mut derived = self.ast.reselected(vec![
            SelectItem::Column(property),
            SelectItem::Column(Column::predefined_number()),
            SelectItem::Column(Column::predefined_name()),
        ]);
        derived.order_by = vec![(Column::predefined_modified_on(), SortOrder::Desc)];

        let compiled = build_select(&derived, &self.catalog, params)?;
        let rows = backend.execute(&compiled.sql)?;

        let mut groups: Vec<PropertyGroup> = Vec::new();
        for row in &rows {
            let value = row.get(&label).and_then(cell_string);
            let group = match groups.iter_mut().find(|g| g.value == value) {
                Some(g) => g,
                None => {
                    groups.push(PropertyGroup {
                        value,
                        count: 0,
                        cards: Vec::new(),
                    });
                    groups.last_mut().expect("just pushed")
                }
            };
            group.count += 1;
            if limit.map(|l| group.cards.len() < l).unwrap_or(true) {
                if let Some(card) = row_card_identifier(row) {
                    group.cards.push(card);
                }
            }
        }
        Ok(groups)
    }

    /// XML serialization for macros; the two API versions differ in key
    /// sanitization and wrapping.
    pub fn values_for_macro(
        &self,
        backend: &dyn ExecutionBackend,
        params: &CompileParams,
        api_version: ApiVersion,
    ) -> MqlResult<String> {
        let (rows, compiled) = self.execute(backend, params)?;
        let visible = visible_labels(&compiled);

        let mut xml = String::new();
        match api_version {
            ApiVersion::V1 => xml.push_str("<results type=\"array\">"),
            ApiVersion::V2 => xml.push_str("<results>"),
        }
        for row in &rows {
            xml.push_str("<result>");
            for label in &visible {
                let key = match api_version {
                    ApiVersion::V1 => v1_key(label),
                    ApiVersion::V2 => v2_key(label),
                };
                let cell = row
                    .get(label)
                    .and_then(cell_string)
                    .unwrap_or_default();
                xml.push_str(&format!("<{key}>{}</{key}>", xml_escape(&cell)));
            }
            xml.push_str("</result>");
        }
        xml.push_str("</results>");
        Ok(xml)
    }

    /// Round-trip simple filter shapes into the saved-filter widget
    /// representation; anything else degrades to a raw MQL filter.
    pub fn as_card_list_view(&self) -> CardListView {
        if self.ast.explicit_columns
            || !self.ast.group_by.is_empty()
            || !self.ast.order_by.is_empty()
            || self.ast.as_of.is_some()
            || self.ast.from_tree.is_some()
        {
            return CardListView::Mql(self.to_string());
        }
        let Some(conditions) = &self.ast.conditions else {
            return CardListView::Filters(Vec::new());
        };
        match filter_clauses(conditions) {
            Some(clauses) => CardListView::Filters(clauses),
            None => CardListView::Mql(self.to_string()),
        }
    }
}

impl std::fmt::Display for CardQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ast)
    }
}

impl CardListView {
    /// Regenerate the MQL filter this view represents.
    pub fn to_mql(&self) -> String {
        match self {
            CardListView::Mql(mql) => mql.clone(),
            CardListView::Filters(clauses) => {
                let mut properties: Vec<&str> = Vec::new();
                for clause in clauses {
                    if !properties.contains(&clause.property.as_str()) {
                        properties.push(&clause.property);
                    }
                }

                let mut parts = Vec::new();
                for property in properties {
                    let is_parts: Vec<String> = clauses
                        .iter()
                        .filter(|c| c.property == property && c.operator == FilterOp::Is)
                        .map(FilterClause::to_mql_fragment)
                        .collect();
                    match is_parts.len() {
                        0 => {}
                        1 => parts.push(is_parts.into_iter().next().expect("one part")),
                        _ => parts.push(format!("({})", is_parts.join(" OR "))),
                    }
                    parts.extend(
                        clauses
                            .iter()
                            .filter(|c| c.property == property && c.operator == FilterOp::IsNot)
                            .map(FilterClause::to_mql_fragment),
                    );
                }
                parts.join(" AND ")
            }
        }
    }
}

impl FilterClause {
    fn to_mql_fragment(&self) -> String {
        let property = quote_if_needed(&self.property);
        match (&self.operator, &self.value) {
            (FilterOp::Is, Some(v)) => format!("{property} = '{v}'"),
            (FilterOp::Is, None) => format!("{property} IS NULL"),
            (FilterOp::IsNot, Some(v)) => format!("{property} != '{v}'"),
            (FilterOp::IsNot, None) => format!("{property} IS NOT NULL"),
        }
    }
}

/// Convert a condition tree into filter clauses, or None when the shape is
/// not expressible by the widget.
fn filter_clauses(condition: &Condition) -> Option<Vec<FilterClause>> {
    match condition {
        Condition::And(xs) => {
            let mut clauses = Vec::new();
            for x in xs {
                clauses.extend(simple_clauses(x)?);
            }
            Some(clauses)
        }
        other => simple_clauses(other),
    }
}

fn simple_clauses(condition: &Condition) -> Option<Vec<FilterClause>> {
    match condition {
        Condition::Comparison {
            column,
            op,
            rhs: Rhs::Value(value),
        } => {
            let operator = match op {
                crate::ast::CmpOp::Eq => FilterOp::Is,
                crate::ast::CmpOp::Ne => FilterOp::IsNot,
                _ => return None,
            };
            Some(vec![FilterClause {
                property: column.name.clone(),
                operator,
                value: Some(value_text(value)),
            }])
        }
        Condition::IsNull { column, negated } => Some(vec![FilterClause {
            property: column.name.clone(),
            operator: if *negated { FilterOp::IsNot } else { FilterOp::Is },
            value: None,
        }]),
        Condition::InList { column, values } => Some(
            values
                .iter()
                .map(|v| FilterClause {
                    property: column.name.clone(),
                    operator: FilterOp::Is,
                    value: Some(value_text(v)),
                })
                .collect(),
        ),
        Condition::Or(xs) => {
            // Expressible only as repeated is-clauses on one property.
            let mut clauses: Vec<FilterClause> = Vec::new();
            let mut property: Option<String> = None;
            for x in xs {
                let inner = simple_clauses(x)?;
                for clause in inner {
                    if clause.operator != FilterOp::Is {
                        return None;
                    }
                    match &property {
                        None => property = Some(clause.property.clone()),
                        Some(p) if *p == clause.property => {}
                        Some(_) => return None,
                    }
                    clauses.push(clause);
                }
            }
            Some(clauses)
        }
        _ => None,
    }
}

fn value_text(value: &CardValue) -> String {
    match value {
        CardValue::Null => String::new(),
        CardValue::Number(n) => n.to_string(),
        CardValue::Text(s) | CardValue::User(s) => s.clone(),
        CardValue::Date(d) => d.format("%d %b %Y").to_string(),
        CardValue::CardNumber(n) => n.to_string(),
    }
}

fn quote_if_needed(name: &str) -> String {
    if name.chars().any(|c| !c.is_alphanumeric() && c != '_') {
        format!("'{name}'")
    } else {
        name.to_string()
    }
}

fn visible_labels(compiled: &CompiledSelect) -> Vec<String> {
    compiled
        .columns
        .iter()
        .filter(|c| !c.implicit)
        .map(|c| c.label.clone())
        .collect()
}

fn row_card_identifier(row: &Row) -> Option<CardIdentifier> {
    Some(CardIdentifier {
        number: row.get("number").and_then(cell_i64)?,
        name: row.get("name").and_then(cell_string)?,
    })
}

fn cell_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn cell_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn cell_decimal(value: &JsonValue) -> Option<Decimal> {
    match value {
        JsonValue::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        JsonValue::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}

/// v1 keys: hyphenated words, parentheses replaced by underscores
/// (`sum(size)` comes out `sum_size_`).
fn v1_key(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' => '-',
            c if c.is_alphanumeric() || c == '-' || c == '_' => c,
            _ => '_',
        })
        .collect()
}

/// v2 keys: sanitized snake_case (`sum(size)` comes out `sum_size`).
fn v2_key(label: &str) -> String {
    let mut out = String::new();
    let mut last_underscore = false;
    for c in label.to_lowercase().chars() {
        if c.is_alphanumeric() {
            out.push(c);
            last_underscore = false;
        } else if !last_underscore && !out.is_empty() {
            out.push('_');
            last_underscore = true;
        }
    }
    out.trim_end_matches('_').to_string()
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
