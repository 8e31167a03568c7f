//! Condition building for SQL WHERE and HAVING clauses
//!
//! Converts a [`WhereStatement`] into SQL text with numbered placeholders
//! (`$1`, `$2`, ...) and collects the values to bind in a [`ParameterSet`].
//! One set is shared by every clause of a command, so placeholder numbers
//! never collide between SET/VALUES, WHERE, and HAVING.

use crate::error::{RecordStoreError, Result};
use crate::sql::literal::{Placeholder, format_literal};
use crate::sql::sanitize::{parameter_suffix, quote_qualified, render_field};
use crate::statement::{Comparison, OrderByClause, Sorting, WhereClause, WhereStatement};
use crate::types::Value;

/// A value bound to a command
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Diagnostic name, `p{N}_{field}`
    pub name: String,
    pub value: Value,
}

/// Ordered parameters of one command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return the placeholder that refers to it
    pub fn push(&mut self, field: &str, value: Value) -> Placeholder {
        let index = self.params.len() + 1;
        self.params.push(Parameter {
            name: format!("p{}_{}", index, parameter_suffix(field)),
            value,
        });
        Placeholder::new(index)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn into_vec(self) -> Vec<Parameter> {
        self.params
    }
}

/// Build the condition text for a statement (without the `WHERE` keyword)
///
/// Levels are joined with `OR`. Clauses inside a level are joined with `AND`
/// and the level is parenthesized when it holds more than one clause. A
/// clause with sub-clauses is parenthesized when it has siblings. Returns an
/// empty string for a statement without clauses.
///
/// `tables` are the tables the command reads; see [`quote_qualified`].
pub fn build_where_clause(
    statement: &WhereStatement,
    tables: &[String],
    params: &mut ParameterSet,
) -> Result<String> {
    let levels: Vec<&Vec<WhereClause>> = statement
        .levels()
        .iter()
        .filter(|level| !level.is_empty())
        .collect();
    let single = levels.len() == 1;

    let mut rendered_levels = Vec::with_capacity(levels.len());
    for level in levels {
        let grouped = level.len() > 1;
        let mut rendered = Vec::with_capacity(level.len());
        for clause in level {
            let text = render_clause(clause, tables, params)?;
            if !clause.sub_clauses.is_empty() && (grouped || !single) {
                rendered.push(format!("({})", text));
            } else {
                rendered.push(text);
            }
        }

        let joined = rendered.join(" AND ");
        if grouped {
            rendered_levels.push(format!("({})", joined));
        } else {
            rendered_levels.push(joined);
        }
    }

    Ok(rendered_levels.join(" OR "))
}

/// A clause's own comparison followed by its chained sub-clauses
fn render_clause(
    clause: &WhereClause,
    tables: &[String],
    params: &mut ParameterSet,
) -> Result<String> {
    let column = quote_qualified(&clause.field, tables);
    let mut text = render_comparison(
        &clause.field,
        &column,
        clause.comparison,
        &clause.value,
        params,
    )?;
    for sub in &clause.sub_clauses {
        let condition =
            render_comparison(&clause.field, &column, sub.comparison, &sub.value, params)?;
        text.push(' ');
        text.push_str(sub.logic.as_sql());
        text.push(' ');
        text.push_str(&condition);
    }
    Ok(text)
}

/// Render one comparison, binding its value
///
/// Null comparands only work with `Equals` / `NotEquals`. Wildcard operators
/// bind the value with its `%` markers already applied. `In` splits a text
/// value on commas and binds each item. `column` is the already quoted
/// reference to `field`.
pub fn render_comparison(
    field: &str,
    column: &str,
    comparison: Comparison,
    value: &Value,
    params: &mut ParameterSet,
) -> Result<String> {

    if value.is_null() || matches!(value, Value::Json(serde_json::Value::Null)) {
        return match comparison {
            Comparison::Equals => Ok(format!("{} IS NULL", column)),
            Comparison::NotEquals => Ok(format!("NOT {} IS NULL", column)),
            other => Err(RecordStoreError::NullComparison(other)),
        };
    }

    if comparison.uses_wildcards() {
        let text = value.to_text().unwrap_or_default();
        let placeholder = params.push(field, Value::String(comparison.wrap_wildcards(&text)));
        let placeholder = format_literal(placeholder);
        return Ok(match comparison {
            Comparison::NotLike => format!("NOT {} LIKE {}", column, placeholder),
            _ => format!("{} LIKE {}", column, placeholder),
        });
    }

    if comparison == Comparison::In {
        let items = in_items(value);
        if items.is_empty() {
            return Err(RecordStoreError::empty_input(format!(
                "IN comparison on '{}' has no values",
                field
            )));
        }
        let placeholders = items
            .into_iter()
            .map(|item| format_literal(params.push(field, item)))
            .collect::<Vec<_>>()
            .join(", ");
        return Ok(format!("{} IN ({})", column, placeholders));
    }

    let operator = match comparison {
        Comparison::Equals => "=",
        Comparison::NotEquals => "<>",
        Comparison::GreaterThan => ">",
        Comparison::GreaterOrEquals => ">=",
        Comparison::LessThan => "<",
        Comparison::LessOrEquals => "<=",
        // Handled above
        Comparison::Begins
        | Comparison::Ends
        | Comparison::Like
        | Comparison::NotLike
        | Comparison::In => unreachable!(),
    };

    let placeholder = params.push(field, value.clone());
    Ok(format!("{} {} {}", column, operator, format_literal(placeholder)))
}

/// Values of an `In` comparand
fn in_items(value: &Value) -> Vec<Value> {
    match value {
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(Value::from)
            .collect(),
        Value::Json(serde_json::Value::Array(items)) => {
            items.iter().cloned().map(Value::from_json).collect()
        }
        other => vec![other.clone()],
    }
}

/// Build the ORDER BY list (without the keyword)
pub fn build_order_by_clause(order_by: &[OrderByClause], tables: &[String]) -> Result<String> {
    let mut order_parts = Vec::with_capacity(order_by.len());
    for clause in order_by {
        let direction = match clause.sort_order {
            Sorting::Ascending => "ASC",
            Sorting::Descending => "DESC",
        };
        order_parts.push(format!("{} {}", render_field(&clause.field, tables)?, direction));
    }
    Ok(order_parts.join(", "))
}
