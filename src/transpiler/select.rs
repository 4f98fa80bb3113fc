//! SELECT SQL generation.
//!
//! Walks the bound AST into a single SELECT statement against either the
//! current `cards` table or the historical `card_versions` table. All
//! literals and identifiers pass through the dialect hooks; nothing is
//! interpolated from user text directly.

use crate::ast::{
    CardValue, CmpOp, Column, ColumnSource, Condition, OrdinalClass, Query, Rhs, SelectItem,
    SortOrder,
};
use crate::catalog::PropertyCatalog;
use crate::error::{MqlError, MqlResult};
use crate::transpiler::traits::{Dialect, SqlDialect};
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Explicit compilation parameters. The clock and the acting user are
/// passed in, never read from ambient state, so compilation stays pure and
/// `can_be_cached` semantics hold.
#[derive(Debug, Clone)]
pub struct CompileParams {
    pub dialect: Dialect,
    pub now: NaiveDateTime,
    pub acting_user: Option<String>,
    /// Cast numeric result columns to decimal; needed when a result column
    /// mixes numeric and non-numeric values (group-by pivots).
    pub cast_numeric_columns: bool,
}

impl CompileParams {
    pub fn new(dialect: Dialect, now: NaiveDateTime) -> Self {
        Self {
            dialect,
            now,
            acting_user: None,
            cast_numeric_columns: false,
        }
    }

    pub fn with_acting_user(mut self, user: impl Into<String>) -> Self {
        self.acting_user = Some(user.into());
        self
    }

    pub fn with_numeric_casts(mut self) -> Self {
        self.cast_numeric_columns = true;
        self
    }
}

/// One result column of a compiled statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultColumn {
    /// Row key the backend reports this column under.
    pub label: String,
    /// Injected by the generator (stable-ordering Number); dropped from
    /// externally visible results.
    pub implicit: bool,
}

#[derive(Debug, Clone)]
pub struct CompiledSelect {
    pub sql: String,
    pub columns: Vec<ResultColumn>,
}

pub fn build_select(
    query: &Query,
    catalog: &PropertyCatalog,
    params: &CompileParams,
) -> MqlResult<CompiledSelect> {
    Builder::new(query, catalog, params).build(false)
}

struct Builder<'a> {
    query: &'a Query,
    catalog: &'a PropertyCatalog,
    params: &'a CompileParams,
    g: &'static dyn SqlDialect,
    table: &'static str,
}

impl<'a> Builder<'a> {
    fn new(query: &'a Query, catalog: &'a PropertyCatalog, params: &'a CompileParams) -> Self {
        let table = if query.as_of.is_some() {
            "card_versions"
        } else {
            "cards"
        };
        Self {
            query,
            catalog,
            params,
            g: params.dialect.generator(),
            table,
        }
    }

    fn build(&self, nested: bool) -> MqlResult<CompiledSelect> {
        let number_column = Column::predefined_number();
        let name_column = Column::predefined_name();

        // Implicit selection when the query text had no SELECT clause.
        let mut items: Vec<(SelectItem, bool)> = if self.query.columns.is_empty() {
            vec![
                (SelectItem::Column(number_column.clone()), false),
                (SelectItem::Column(name_column), false),
            ]
        } else {
            self.query.columns.iter().map(|c| (c.clone(), false)).collect()
        };

        let has_aggregates = items.iter().any(|(i, _)| i.is_aggregate());
        let non_aggregates: Vec<Column> = items
            .iter()
            .filter_map(|(i, _)| match i {
                SelectItem::Column(c) => Some(c.clone()),
                SelectItem::Aggregate { .. } => None,
            })
            .collect();

        // Aggregate + non-aggregate mixes group over the non-aggregates.
        let group_cols: Vec<Column> = if !self.query.group_by.is_empty() {
            self.query.group_by.clone()
        } else if has_aggregates && !non_aggregates.is_empty() {
            non_aggregates.clone()
        } else {
            Vec::new()
        };

        // Deterministic ordering when none was requested.
        let mut order: Vec<(Column, SortOrder)> = self.query.order_by.clone();
        let mut position_ordering = true;
        if order.is_empty() && !nested {
            if !group_cols.is_empty() {
                order = group_cols
                    .iter()
                    .map(|c| (c.clone(), SortOrder::Asc))
                    .collect();
            } else if has_aggregates {
                // Pure aggregates produce a single row; nothing to order.
            } else if self.query.distinct {
                // DISTINCT constrains ORDER BY to the selected expressions,
                // so managed columns order by raw value here.
                position_ordering = false;
                order = non_aggregates
                    .iter()
                    .map(|c| (c.clone(), SortOrder::Asc))
                    .collect();
            } else {
                let selects_number = non_aggregates.iter().any(|c| c.is_card_number());
                if !selects_number {
                    items.push((SelectItem::Column(number_column.clone()), true));
                }
                order = vec![(number_column, SortOrder::Desc)];
            }
        }

        // Enumeration-position joins for ordered managed columns.
        let mut joins: Vec<String> = Vec::new();
        let mut position_aliases: HashMap<String, String> = HashMap::new();
        for (col, _) in &order {
            if position_ordering && col.is_managed() && !position_aliases.contains_key(&col.column_name)
            {
                let alias = format!("ev{}", position_aliases.len() + 1);
                let property_id = col.property_id.ok_or_else(|| {
                    MqlError::domain(format!("Property '{}' has no definition id", col.name))
                })?;
                joins.push(format!(
                    "LEFT OUTER JOIN enumeration_values {alias} ON LOWER({alias}.value) = \
                     LOWER({col}) AND {alias}.property_definition_id = {property_id}",
                    col = self.col_expr(col)
                ));
                position_aliases.insert(col.column_name.clone(), alias);
            }
        }

        let mut select_parts = Vec::new();
        let mut result_columns = Vec::new();
        for (item, implicit) in &items {
            let label = item.label();
            select_parts.push(format!(
                "{} AS {}",
                self.select_expr(item)?,
                self.g.quote_identifier(&label)
            ));
            result_columns.push(ResultColumn {
                label,
                implicit: *implicit,
            });
        }

        let mut where_parts = Vec::new();
        if let Some(conditions) = &self.query.conditions {
            where_parts.push(self.condition_sql(conditions)?);
        }
        if let Some(tree_name) = &self.query.from_tree {
            where_parts.push(self.tree_scope_sql(tree_name)?);
        }
        if let Some(as_of) = self.query.as_of {
            let cutoff = as_of.and_hms_opt(23, 59, 59).expect("valid time of day");
            where_parts.push(format!(
                "{t}.version = (SELECT MAX(cv2.version) FROM card_versions cv2 \
                 WHERE cv2.card_id = {t}.card_id AND cv2.updated_at <= {ts})",
                t = self.table,
                ts = self.g.timestamp_literal(cutoff)
            ));
        }

        let mut sql = String::from("SELECT ");
        if self.query.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&select_parts.join(", "));
        sql.push_str(&format!(" FROM {}", self.table));
        for join in &joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !where_parts.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_parts.join(" AND "));
        }

        if !group_cols.is_empty() {
            let mut group_parts = Vec::new();
            for col in &group_cols {
                group_parts.push(self.col_expr(col));
                if let Some(alias) = position_aliases.get(&col.column_name) {
                    group_parts.push(format!("{alias}.position"));
                }
            }
            sql.push_str(" GROUP BY ");
            sql.push_str(&group_parts.join(", "));
        }

        if !order.is_empty() {
            let order_parts: Vec<String> = order
                .iter()
                .map(|(col, dir)| format!("{} {dir}", self.order_expr(col, &position_aliases)))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_parts.join(", "));
        }

        Ok(CompiledSelect {
            sql,
            columns: result_columns,
        })
    }

    fn col_expr(&self, column: &Column) -> String {
        format!("{}.{}", self.table, column.column_name)
    }

    /// User-defined numeric properties live in character columns; numeric
    /// comparison and aggregation cast them.
    fn numeric_expr(&self, column: &Column) -> String {
        let expr = self.col_expr(column);
        if column.source == ColumnSource::Predefined {
            expr
        } else {
            self.g.cast_to_decimal(&expr)
        }
    }

    fn select_expr(&self, item: &SelectItem) -> MqlResult<String> {
        Ok(match item {
            SelectItem::Column(c) => {
                if c.is_numeric_valued() && self.params.cast_numeric_columns {
                    self.numeric_expr(c)
                } else {
                    self.col_expr(c)
                }
            }
            SelectItem::Aggregate { func, column } => match column {
                None => format!("{func}(*)"),
                Some(c) => {
                    let expr = if c.is_numeric_valued() {
                        self.numeric_expr(c)
                    } else {
                        self.col_expr(c)
                    };
                    format!("{func}({expr})")
                }
            },
        })
    }

    fn order_expr(&self, column: &Column, position_aliases: &HashMap<String, String>) -> String {
        if let Some(alias) = position_aliases.get(&column.column_name) {
            return format!("{alias}.position");
        }
        match column.ordinal_class {
            OrdinalClass::CardType => self.card_type_order_expr(column),
            OrdinalClass::Numeric => self.numeric_expr(column),
            _ => self.col_expr(column),
        }
    }

    /// Card types order by catalog position, expressed as a CASE over the
    /// ordered type list.
    fn card_type_order_expr(&self, column: &Column) -> String {
        let mut expr = format!("CASE {}", self.col_expr(column));
        for (position, name) in self.catalog.card_types().iter().enumerate() {
            expr.push_str(&format!(
                " WHEN {} THEN {position}",
                self.g.quote_string(name)
            ));
        }
        expr.push_str(" END");
        expr
    }

    fn condition_sql(&self, condition: &Condition) -> MqlResult<String> {
        Ok(match condition {
            Condition::And(xs) => {
                let parts: Vec<String> = xs
                    .iter()
                    .map(|x| self.condition_sql(x))
                    .collect::<MqlResult<_>>()?;
                parts.join(" AND ")
            }
            Condition::Or(xs) => {
                let parts: Vec<String> = xs
                    .iter()
                    .map(|x| self.condition_sql(x))
                    .collect::<MqlResult<_>>()?;
                format!("({})", parts.join(" OR "))
            }
            Condition::Not(x) => format!("NOT ({})", self.condition_sql(x)?),
            Condition::Comparison { column, op, rhs } => {
                self.comparison_sql(column, *op, rhs)?
            }
            Condition::IsNull { column, negated } => {
                let suffix = if *negated { "IS NOT NULL" } else { "IS NULL" };
                format!("{} {suffix}", self.col_expr(column))
            }
            Condition::TaggedWith { tag, negated } => self.tagged_with_sql(tag, *negated),
            Condition::InList { column, values } => self.in_list_sql(column, values)?,
            Condition::NumbersInList { column, numbers } => {
                let list: Vec<String> = numbers.iter().map(|n| n.to_string()).collect();
                format!("{} IN ({})", self.col_expr(column), list.join(", "))
            }
            Condition::InSubquery {
                column,
                query,
                numbers: _,
            } => self.in_subquery_sql(column, query)?,
            Condition::InPlan { plan } => {
                let plan_id = self.catalog.resolve_plan(plan).ok_or_else(|| {
                    MqlError::domain(format!("Plan '{plan}' does not exist"))
                })?;
                format!(
                    "{}.number IN (SELECT card_number FROM scheduled_works \
                     WHERE plan_id = {plan_id})",
                    self.table
                )
            }
        })
    }

    /// Tags expand to an existence subquery per tag. A tag the project does
    /// not have degrades to an always-false branch instead of erroring.
    fn tagged_with_sql(&self, tag: &str, negated: bool) -> String {
        match self.catalog.resolve_tag(tag) {
            Some(tag_id) => {
                let membership = if negated { "NOT IN" } else { "IN" };
                format!(
                    "{}.id {membership} (SELECT taggable_id FROM taggings \
                     WHERE tag_id = {tag_id} AND taggable_type = 'Card')",
                    self.table
                )
            }
            None if negated => "1 = 1".to_string(),
            None => "1 = 0".to_string(),
        }
    }

    fn tree_scope_sql(&self, tree_name: &str) -> MqlResult<String> {
        let tree = self
            .catalog
            .tree(tree_name)
            .ok_or_else(|| MqlError::TreeNotExist(tree_name.to_string()))?;
        Ok(format!(
            "{}.id IN (SELECT card_id FROM tree_belongings WHERE tree_id = {})",
            self.table, tree.id
        ))
    }

    fn comparison_sql(&self, column: &Column, op: CmpOp, rhs: &Rhs) -> MqlResult<String> {
        let value = match rhs {
            Rhs::Value(v) => v.clone(),
            Rhs::Plv { value, .. } => value.clone(),
            Rhs::ThisCard { value, .. } => value.clone(),
            Rhs::Today => CardValue::Date(self.params.now.date()),
            Rhs::CurrentUser => match &self.params.acting_user {
                Some(user) => CardValue::User(user.clone()),
                None => {
                    return Err(MqlError::domain(
                        "CURRENT USER is not available without an acting user",
                    ));
                }
            },
            Rhs::Property(other) => {
                return Ok(format!(
                    "{} {} {}",
                    self.numeric_expr(column),
                    op.sql_symbol(),
                    self.numeric_expr(other)
                ));
            }
        };

        // The THIS CARD null placeholder: equality degrades to a null
        // check, ordered comparison can never match.
        if value.is_null() {
            return Ok(match op {
                CmpOp::Eq => format!("{} IS NULL", self.col_expr(column)),
                CmpOp::Ne => format!("{} IS NOT NULL", self.col_expr(column)),
                _ => "1 = 0".to_string(),
            });
        }

        let sym = op.sql_symbol();
        Ok(match column.ordinal_class {
            OrdinalClass::Numeric => {
                format!("{} {sym} {}", self.numeric_expr(column), self.value_sql(&value))
            }
            OrdinalClass::Enumerated if op.is_ordered() => {
                let position = self.enum_position(column, &value)?;
                format!("{} {sym} {position}", self.position_expr(column)?)
            }
            OrdinalClass::Enumerated | OrdinalClass::Text => format!(
                "LOWER({}) {sym} LOWER({})",
                self.col_expr(column),
                self.value_sql(&value)
            ),
            OrdinalClass::Date => {
                format!("{} {sym} {}", self.col_expr(column), self.value_sql(&value))
            }
            OrdinalClass::User => {
                format!("{} {sym} {}", self.col_expr(column), self.value_sql(&value))
            }
            OrdinalClass::CardType if op.is_ordered() => self.card_type_range_sql(op, &value)?,
            OrdinalClass::CardType => {
                format!("{} {sym} {}", self.col_expr(column), self.value_sql(&value))
            }
            OrdinalClass::CardRelationship => match &value {
                CardValue::CardNumber(n) => format!("{} {sym} {n}", self.col_expr(column)),
                CardValue::Text(name) => {
                    let membership = if op == CmpOp::Ne { "NOT IN" } else { "IN" };
                    format!(
                        "{} {membership} (SELECT number FROM cards WHERE LOWER(name) = LOWER({}))",
                        self.col_expr(column),
                        self.g.quote_string(name)
                    )
                }
                other => format!("{} {sym} {}", self.col_expr(column), self.value_sql(other)),
            },
        })
    }

    /// Position of the compared value within the managed ordering.
    fn enum_position(&self, column: &Column, value: &CardValue) -> MqlResult<i32> {
        let text = match value {
            CardValue::Text(s) => s.as_str(),
            other => {
                return Err(MqlError::domain(format!(
                    "'{other}' is not a valid value for property '{}'",
                    column.name
                )));
            }
        };
        self.catalog
            .resolve_property(&column.name)
            .and_then(|def| def.position_of(text))
            .ok_or_else(|| {
                MqlError::domain(format!(
                    "'{text}' is not a valid value for property '{}'",
                    column.name
                ))
            })
    }

    /// Correlated position of the row's own value within the managed
    /// ordering, for ordinal comparisons on enumerated properties.
    fn position_expr(&self, column: &Column) -> MqlResult<String> {
        let property_id = column.property_id.ok_or_else(|| {
            MqlError::domain(format!("Property '{}' has no definition id", column.name))
        })?;
        Ok(format!(
            "(SELECT ev.position FROM enumeration_values ev WHERE LOWER(ev.value) = \
             LOWER({}) AND ev.property_definition_id = {property_id})",
            self.col_expr(column)
        ))
    }

    /// Ordinal card-type comparison: the set of type names whose catalog
    /// position satisfies the comparison.
    fn card_type_range_sql(&self, op: CmpOp, value: &CardValue) -> MqlResult<String> {
        let name = match value {
            CardValue::Text(s) => s.as_str(),
            other => {
                return Err(MqlError::domain(format!("'{other}' is not a valid card type")));
            }
        };
        let pivot = self
            .catalog
            .card_type_position(name)
            .ok_or_else(|| MqlError::domain(format!("'{name}' is not a valid card type")))?;

        let matching: Vec<String> = self
            .catalog
            .card_types()
            .iter()
            .enumerate()
            .filter(|(position, _)| match op {
                CmpOp::Gt => *position > pivot,
                CmpOp::Gte => *position >= pivot,
                CmpOp::Lt => *position < pivot,
                CmpOp::Lte => *position <= pivot,
                CmpOp::Eq | CmpOp::Ne => unreachable!("handled as direct comparison"),
            })
            .map(|(_, t)| self.g.quote_string(t))
            .collect();

        if matching.is_empty() {
            return Ok("1 = 0".to_string());
        }
        Ok(format!(
            "{}.card_type_name IN ({})",
            self.table,
            matching.join(", ")
        ))
    }

    fn in_list_sql(&self, column: &Column, values: &[CardValue]) -> MqlResult<String> {
        let rendered: Vec<String> = values.iter().map(|v| self.value_sql(v)).collect();
        Ok(match column.ordinal_class {
            OrdinalClass::Enumerated | OrdinalClass::Text => {
                let lowered: Vec<String> =
                    rendered.iter().map(|v| format!("LOWER({v})")).collect();
                format!(
                    "LOWER({}) IN ({})",
                    self.col_expr(column),
                    lowered.join(", ")
                )
            }
            OrdinalClass::Numeric => {
                format!("{} IN ({})", self.numeric_expr(column), rendered.join(", "))
            }
            OrdinalClass::CardRelationship => {
                let lowered: Vec<String> =
                    rendered.iter().map(|v| format!("LOWER({v})")).collect();
                format!(
                    "{} IN (SELECT number FROM cards WHERE LOWER(name) IN ({}))",
                    self.col_expr(column),
                    lowered.join(", ")
                )
            }
            OrdinalClass::Date | OrdinalClass::User | OrdinalClass::CardType => {
                format!("{} IN ({})", self.col_expr(column), rendered.join(", "))
            }
        })
    }

    fn in_subquery_sql(&self, column: &Column, nested: &Query) -> MqlResult<String> {
        let compiled = Builder::new(nested, self.catalog, self.params).build(true)?;
        let selects_name = matches!(
            nested.columns.as_slice(),
            [SelectItem::Column(c)] if c.is_card_name()
        );

        if column.is_relationship() && selects_name {
            // The relationship column stores card numbers; a name-selecting
            // sub-query compares through the referenced card's name.
            return Ok(format!(
                "(SELECT related.name FROM cards related WHERE related.number = {}) IN ({})",
                self.col_expr(column),
                compiled.sql
            ));
        }
        Ok(format!("{} IN ({})", self.col_expr(column), compiled.sql))
    }

    fn value_sql(&self, value: &CardValue) -> String {
        match value {
            CardValue::Null => "NULL".to_string(),
            CardValue::Number(n) => n.to_string(),
            CardValue::Text(s) => self.g.quote_string(s),
            CardValue::Date(d) => self.g.date_literal(*d),
            CardValue::User(u) => self.g.quote_string(u),
            CardValue::CardNumber(n) => n.to_string(),
        }
    }
}

