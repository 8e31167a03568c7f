//! Statement building for store commands
//!
//! [`CommandBuilder`] turns a table name plus records, predicates, or a
//! [`SelectQuery`] into a [`Command`]: SQL text with numbered placeholders and
//! the parameters to bind. Building never touches the database.

use crate::error::{RecordStoreError, Result};
use crate::record::Record;
use crate::schema::ColumnDefinition;
use crate::sql::condition::{Parameter, ParameterSet, build_order_by_clause, build_where_clause};
use crate::sql::ddl::DdlGenerator;
use crate::sql::literal::format_literal;
use crate::sql::sanitize::{quote_identifier, render_field, validate_target};
use crate::statement::{OrderByClause, WhereStatement};

/// A built, not yet executed statement
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub sql: String,
    pub params: Vec<Parameter>,
}

impl Command {
    /// A command without parameters
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    fn with_params(sql: String, params: ParameterSet) -> Self {
        Self {
            sql,
            params: params.into_vec(),
        }
    }
}

/// SELECT description consumed by [`CommandBuilder::select`]
///
/// # Example
/// ```
/// use runtara_record_store::{CommandBuilder, OrderByClause, SelectQuery};
///
/// let query = SelectQuery::new("Widget")
///     .fields(["name", "COUNT(*)"])
///     .group_by(["name"])
///     .order_by(OrderByClause::ascending("name"));
/// let command = CommandBuilder::new().select(&query).unwrap();
///
/// assert_eq!(
///     command.sql,
///     "SELECT \"name\", COUNT(*) FROM \"Widget\" GROUP BY \"name\" ORDER BY \"name\" ASC"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    pub tables: Vec<String>,
    pub fields: Vec<String>,
    pub filter: Option<WhereStatement>,
    pub having: Option<WhereStatement>,
    pub group_by: Vec<String>,
    pub order_by: Vec<OrderByClause>,
    pub distinct: bool,
    pub limit: Option<usize>,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            tables: vec![table.into()],
            ..Self::default()
        }
    }

    /// Add another table to the FROM list (cross join)
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.tables.push(table.into());
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn filter(mut self, statement: WhereStatement) -> Self {
        self.filter = Some(statement);
        self
    }

    pub fn having(mut self, statement: WhereStatement) -> Self {
        self.having = Some(statement);
        self
    }

    pub fn group_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn order_by(mut self, clause: OrderByClause) -> Self {
        self.order_by.push(clause);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Builds parameterized commands for store tables
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandBuilder {
    ddl: DdlGenerator,
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// CREATE TABLE IF NOT EXISTS
    pub fn create(&self, table: &str, columns: &[ColumnDefinition]) -> Result<Command> {
        self.ddl
            .generate_create_table(table, columns)
            .map(Command::new)
    }

    /// One ALTER TABLE ... ADD COLUMN command per column
    pub fn add_columns(&self, table: &str, columns: &[ColumnDefinition]) -> Result<Vec<Command>> {
        Ok(self
            .ddl
            .generate_add_columns(table, columns)?
            .into_iter()
            .map(Command::new)
            .collect())
    }

    /// Multi-row INSERT
    ///
    /// Every record must have the same fields in the same order as the first.
    /// Null and empty values are bound as NULL.
    pub fn insert(&self, table: &str, records: &[Record]) -> Result<Command> {
        validate_target(table)?;

        let first = match records.first() {
            Some(first) if !first.is_empty() => first,
            _ => {
                return Err(RecordStoreError::empty_input(format!(
                    "No values to insert into '{}'",
                    table
                )));
            }
        };

        if let Some(position) = records.iter().position(|record| !record.same_shape(first)) {
            return Err(RecordStoreError::validation(format!(
                "Record {} does not have the same fields as the first record",
                position
            )));
        }

        let columns = first
            .keys()
            .map(quote_identifier)
            .collect::<Vec<_>>()
            .join(", ");

        let mut params = ParameterSet::new();
        let rows = records
            .iter()
            .map(|record| {
                let placeholders = record
                    .iter()
                    .map(|(field, value)| format_literal(params.push(field, value.stored())))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({})", placeholders)
            })
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_identifier(table),
            columns,
            rows
        );
        Ok(Command::with_params(sql, params))
    }

    /// UPDATE with an optional filter
    pub fn update(
        &self,
        table: &str,
        record: &Record,
        filter: Option<&WhereStatement>,
    ) -> Result<Command> {
        validate_target(table)?;
        if record.is_empty() {
            return Err(RecordStoreError::empty_input(format!(
                "No values to update in '{}'",
                table
            )));
        }

        let mut params = ParameterSet::new();
        let assignments = record
            .iter()
            .map(|(field, value)| {
                let placeholder = params.push(field, value.stored());
                format!("{} = {}", quote_identifier(field), format_literal(placeholder))
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!("UPDATE {} SET {}", quote_identifier(table), assignments);
        append_where(&mut sql, filter, &[table.to_string()], &mut params)?;
        Ok(Command::with_params(sql, params))
    }

    /// DELETE with an optional filter
    pub fn delete(&self, table: &str, filter: Option<&WhereStatement>) -> Result<Command> {
        validate_target(table)?;

        let mut params = ParameterSet::new();
        let mut sql = format!("DELETE FROM {}", quote_identifier(table));
        append_where(&mut sql, filter, &[table.to_string()], &mut params)?;
        Ok(Command::with_params(sql, params))
    }

    /// SELECT
    ///
    /// Without explicit fields a single table projects `"table".*` and several
    /// tables project `*`. HAVING requires GROUP BY.
    pub fn select(&self, query: &SelectQuery) -> Result<Command> {
        if query.tables.is_empty() {
            return Err(RecordStoreError::invalid_target("No table available"));
        }
        for table in &query.tables {
            validate_target(table)?;
        }
        if query.having.is_some() && query.group_by.is_empty() {
            return Err(RecordStoreError::HavingWithoutGroupBy);
        }

        let projection = if query.fields.is_empty() {
            match query.tables.as_slice() {
                [table] => format!("{}.*", quote_identifier(table)),
                _ => "*".to_string(),
            }
        } else {
            query
                .fields
                .iter()
                .map(|field| render_field(field, &query.tables))
                .collect::<Result<Vec<_>>>()?
                .join(", ")
        };

        let tables = query
            .tables
            .iter()
            .map(|table| quote_identifier(table))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = String::from("SELECT ");
        if query.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&projection);
        sql.push_str(" FROM ");
        sql.push_str(&tables);

        let mut params = ParameterSet::new();
        append_where(&mut sql, query.filter.as_ref(), &query.tables, &mut params)?;

        if !query.group_by.is_empty() {
            let groups = query
                .group_by
                .iter()
                .map(|field| render_field(field, &query.tables))
                .collect::<Result<Vec<_>>>()?
                .join(", ");
            sql.push_str(" GROUP BY ");
            sql.push_str(&groups);
        }

        if let Some(having) = &query.having {
            let condition = build_where_clause(having, &query.tables, &mut params)?;
            if !condition.is_empty() {
                sql.push_str(" HAVING ");
                sql.push_str(&condition);
            }
        }

        let order = build_order_by_clause(&query.order_by, &query.tables)?;
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        Ok(Command::with_params(sql, params))
    }
}

fn append_where(
    sql: &mut String,
    filter: Option<&WhereStatement>,
    tables: &[String],
    params: &mut ParameterSet,
) -> Result<()> {
    if let Some(statement) = filter {
        let condition = build_where_clause(statement, tables, params)?;
        if !condition.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
        }
    }
    Ok(())
}
