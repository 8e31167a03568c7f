//! Predicate algebra for filter conditions
//!
//! A [`WhereStatement`] is a list of levels. Levels are OR-ed together, the
//! clauses inside one level are AND-ed, and each [`WhereClause`] may chain
//! further comparisons on its own field through [`SubClause`]s.
//!
//! ```
//! use runtara_record_store::{Comparison, LogicOperator, WhereClause, WhereStatement};
//!
//! // (age < 15 OR age >= 20) AND email LIKE 'e%'
//! //   OR name = 'Peter'
//! let mut statement = WhereStatement::new();
//! statement
//!     .add(
//!         WhereClause::new("age", Comparison::LessThan, 15)
//!             .with_subclause(LogicOperator::Or, Comparison::GreaterOrEquals, 20),
//!     )
//!     .unwrap();
//! statement
//!     .add(WhereClause::new("email", Comparison::Begins, "e"))
//!     .unwrap();
//! statement
//!     .add_at(WhereClause::new("name", Comparison::Equals, "Peter"), 2)
//!     .unwrap();
//!
//! assert_eq!(statement.level_count(), 2);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{RecordStoreError, Result};
use crate::record::Record;
use crate::types::Value;

/// Comparison operators for WHERE and HAVING clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    Begins,
    Ends,
    Equals,
    NotEquals,
    Like,
    NotLike,
    GreaterThan,
    GreaterOrEquals,
    LessThan,
    LessOrEquals,
    In,
}

impl Comparison {
    /// Whether the bound value gets `%` markers before binding
    pub fn uses_wildcards(&self) -> bool {
        matches!(
            self,
            Comparison::Begins | Comparison::Ends | Comparison::Like | Comparison::NotLike
        )
    }

    /// Wrap a value's text with the `%` markers this operator needs
    ///
    /// Non-wildcard operators return the text unchanged.
    pub fn wrap_wildcards(&self, text: &str) -> String {
        match self {
            Comparison::Begins => format!("{}%", text),
            Comparison::Ends => format!("%{}", text),
            Comparison::Like | Comparison::NotLike => format!("%{}%", text),
            _ => text.to_string(),
        }
    }
}

/// Logic operators chaining sub-clauses onto a clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicOperator {
    And,
    Or,
}

impl LogicOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            LogicOperator::And => "AND",
            LogicOperator::Or => "OR",
        }
    }
}

/// An additional comparison chained onto a [`WhereClause`]'s field
#[derive(Debug, Clone, PartialEq)]
pub struct SubClause {
    pub logic: LogicOperator,
    pub comparison: Comparison,
    pub value: Value,
}

impl SubClause {
    pub fn new(logic: LogicOperator, comparison: Comparison, value: impl Into<Value>) -> Self {
        Self {
            logic,
            comparison,
            value: value.into(),
        }
    }
}

/// A condition on one column, optionally chained with more comparisons on it
///
/// `WhereClause::new("id", Equals, 1).with_subclause(Or, Equals, 2)` reads as
/// `id = 1 OR id = 2`.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub field: String,
    pub comparison: Comparison,
    pub value: Value,
    pub sub_clauses: Vec<SubClause>,
}

impl WhereClause {
    pub fn new(field: impl Into<String>, comparison: Comparison, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            comparison,
            value: value.into(),
            sub_clauses: Vec::new(),
        }
    }

    /// Chain another comparison on the same field
    pub fn add_subclause(
        &mut self,
        logic: LogicOperator,
        comparison: Comparison,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.sub_clauses.push(SubClause::new(logic, comparison, value));
        self
    }

    /// Builder form of [`WhereClause::add_subclause`]
    pub fn with_subclause(
        mut self,
        logic: LogicOperator,
        comparison: Comparison,
        value: impl Into<Value>,
    ) -> Self {
        self.add_subclause(logic, comparison, value);
        self
    }
}

/// Levels of clauses: OR across levels, AND within a level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereStatement {
    levels: Vec<Vec<WhereClause>>,
}

impl WhereStatement {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `primary_key = id` clause per id, each on its own level
    pub fn for_ids<I, V>(primary_key: &str, ids: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let levels = ids
            .into_iter()
            .map(|id| {
                let id: Value = id.into();
                vec![WhereClause::new(primary_key, Comparison::Equals, id.stored())]
            })
            .collect();
        Self { levels }
    }

    /// One `primary_key = record[primary_key]` clause per record, OR-ed
    pub fn for_records(records: &[Record], primary_key: &str) -> Result<Self> {
        let ids = records
            .iter()
            .map(|record| {
                record.get(primary_key).cloned().ok_or_else(|| {
                    RecordStoreError::validation(format!(
                        "Record has no value for primary key '{}'",
                        primary_key
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::for_ids(primary_key, ids))
    }

    /// A single level AND-ing `field = value` for every field of the record
    ///
    /// Values are compared in their stored form, so empty fields match `NULL`.
    pub fn matching_all(record: &Record) -> Self {
        let clauses: Vec<WhereClause> = record
            .iter()
            .map(|(field, value)| WhereClause::new(field, Comparison::Equals, value.stored()))
            .collect();
        if clauses.is_empty() {
            Self::new()
        } else {
            Self {
                levels: vec![clauses],
            }
        }
    }

    /// Number of levels
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(Vec::is_empty)
    }

    pub fn levels(&self) -> &[Vec<WhereClause>] {
        &self.levels
    }

    /// Add a clause to level 1
    pub fn add(&mut self, clause: WhereClause) -> Result<()> {
        self.add_at(clause, 1)
    }

    /// Add a clause to a 1-indexed level
    ///
    /// The level must already exist or be the next one; skipping a level is a
    /// [`RecordStoreError::LevelGap`].
    pub fn add_at(&mut self, clause: WhereClause, level: usize) -> Result<()> {
        self.level_mut(level)?.push(clause);
        Ok(())
    }

    /// Create a clause from its parts, add it, and return it for chaining
    pub fn add_field(
        &mut self,
        field: impl Into<String>,
        comparison: Comparison,
        value: impl Into<Value>,
        level: usize,
    ) -> Result<&mut WhereClause> {
        let clauses = self.level_mut(level)?;
        clauses.push(WhereClause::new(field, comparison, value));
        let last = clauses.len() - 1;
        Ok(&mut clauses[last])
    }

    fn level_mut(&mut self, level: usize) -> Result<&mut Vec<WhereClause>> {
        if level == 0 {
            return Err(RecordStoreError::validation("Statement levels start at 1"));
        }
        if level > self.levels.len() + 1 {
            return Err(RecordStoreError::LevelGap {
                requested: level,
                existing: self.levels.len(),
            });
        }
        if level == self.levels.len() + 1 {
            self.levels.push(Vec::new());
        }
        Ok(&mut self.levels[level - 1])
    }

    /// Independent deep copy of a statement
    pub fn copy(statement: &WhereStatement) -> WhereStatement {
        statement.clone()
    }

    /// Conjoin `second` onto every level of `first`
    ///
    /// Every clause of `second` (from all of its levels) is appended to each
    /// level of a copy of `first`. When `first` has no levels the result is a
    /// copy of `second`.
    pub fn combine(first: &WhereStatement, second: &WhereStatement) -> WhereStatement {
        if first.levels.is_empty() {
            return second.clone();
        }

        let mut result = first.clone();
        for clause in second.levels.iter().flatten() {
            for level in result.levels.iter_mut() {
                level.push(clause.clone());
            }
        }
        result
    }
}

impl From<WhereClause> for WhereStatement {
    fn from(clause: WhereClause) -> Self {
        Self {
            levels: vec![vec![clause]],
        }
    }
}

/// Sort direction for ORDER BY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sorting {
    #[default]
    Ascending,
    Descending,
}

/// One ORDER BY term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderByClause {
    pub field: String,
    pub sort_order: Sorting,
}

impl OrderByClause {
    pub fn new(field: impl Into<String>, sort_order: Sorting) -> Self {
        Self {
            field: field.into(),
            sort_order,
        }
    }

    pub fn ascending(field: impl Into<String>) -> Self {
        Self::new(field, Sorting::Ascending)
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self::new(field, Sorting::Descending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn eq(field: &str, value: i64) -> WhereClause {
        WhereClause::new(field, Comparison::Equals, value)
    }

    // =========================================================================
    // Level Management Tests
    // =========================================================================

    #[test]
    fn test_add_defaults_to_level_one() {
        let mut statement = WhereStatement::new();
        statement.add(eq("a", 1)).unwrap();
        statement.add(eq("b", 2)).unwrap();

        assert_eq!(statement.level_count(), 1);
        assert_eq!(statement.levels()[0].len(), 2);
    }

    #[test]
    fn test_add_next_level_creates_it() {
        let mut statement = WhereStatement::new();
        statement.add(eq("a", 1)).unwrap();
        statement.add_at(eq("b", 2), 2).unwrap();
        statement.add_at(eq("c", 3), 2).unwrap();

        assert_eq!(statement.level_count(), 2);
        assert_eq!(statement.levels()[1].len(), 2);
    }

    #[test]
    fn test_level_gap_is_rejected() {
        let mut statement = WhereStatement::new();
        let err = statement.add_at(eq("a", 1), 2).unwrap_err();
        assert!(matches!(
            err,
            RecordStoreError::LevelGap {
                requested: 2,
                existing: 0
            }
        ));

        statement.add(eq("a", 1)).unwrap();
        assert!(statement.add_at(eq("b", 1), 3).is_err());
        assert!(statement.add_at(eq("b", 1), 0).is_err());
        assert_eq!(statement.level_count(), 1);
    }

    #[test]
    fn test_add_field_returns_clause_for_chaining() {
        let mut statement = WhereStatement::new();
        statement
            .add_field("id", Comparison::Equals, 1, 1)
            .unwrap()
            .add_subclause(LogicOperator::Or, Comparison::Equals, 2);

        let clause = &statement.levels()[0][0];
        assert_eq!(clause.sub_clauses.len(), 1);
        assert_eq!(clause.sub_clauses[0].logic, LogicOperator::Or);
    }

    // =========================================================================
    // Constructor Tests
    // =========================================================================

    #[test]
    fn test_for_ids_puts_each_id_on_its_own_level() {
        let statement = WhereStatement::for_ids("id", [1, 2, 3]);
        assert_eq!(statement.level_count(), 3);
        assert_eq!(statement.levels()[2][0].value, Value::Integer(3));
    }

    #[test]
    fn test_for_records() {
        let records = vec![
            Record::new().with("id", 1).with("name", "a"),
            Record::new().with("id", 2).with("name", "b"),
        ];
        let statement = WhereStatement::for_records(&records, "id").unwrap();
        assert_eq!(statement.level_count(), 2);

        assert!(WhereStatement::for_records(&records, "missing").is_err());
    }

    #[test]
    fn test_matching_all() {
        let record = Record::new().with("id", 1).with("name", "a");
        let statement = WhereStatement::matching_all(&record);
        assert_eq!(statement.level_count(), 1);
        assert_eq!(statement.levels()[0].len(), 2);

        assert!(WhereStatement::matching_all(&Record::new()).is_empty());
    }

    #[test]
    fn test_matching_all_compares_empty_fields_as_null() {
        let record = Record::new().with("id", 1).with("code", "");
        let statement = WhereStatement::matching_all(&record);
        assert_eq!(statement.levels()[0][1].value, Value::Null);

        let by_ids = WhereStatement::for_ids("code", [""]);
        assert_eq!(by_ids.levels()[0][0].value, Value::Null);
    }

    // =========================================================================
    // Copy / Combine Tests
    // =========================================================================

    #[test]
    fn test_copy_is_independent() {
        let mut original = WhereStatement::new();
        original
            .add(eq("a", 1).with_subclause(LogicOperator::Or, Comparison::Equals, 2))
            .unwrap();

        let mut copy = WhereStatement::copy(&original);
        assert_eq!(copy, original);

        copy.add(eq("b", 3)).unwrap();
        copy.levels[0][0].sub_clauses.clear();

        assert_eq!(original.levels()[0].len(), 1);
        assert_eq!(original.levels()[0][0].sub_clauses.len(), 1);
    }

    #[test]
    fn test_combine_appends_into_every_level() {
        let mut first = WhereStatement::new();
        first.add(eq("age", 10)).unwrap();
        first.add(eq("email", 1)).unwrap();
        first.add_at(eq("age", 17), 2).unwrap();

        let second = WhereStatement::from(WhereClause::new("name", Comparison::Equals, "Peter"));

        let combined = WhereStatement::combine(&first, &second);

        assert_eq!(combined.level_count(), 2);
        assert_eq!(combined.levels()[0].len(), 3);
        assert_eq!(combined.levels()[1].len(), 2);
        assert_eq!(combined.levels()[0][2].field, "name");
        assert_eq!(combined.levels()[1][1].field, "name");

        // Arguments untouched
        assert_eq!(first.levels()[0].len(), 2);
        assert_eq!(second.levels()[0].len(), 1);
    }

    #[test]
    fn test_combine_with_empty_first() {
        let second = WhereStatement::from(eq("a", 1));
        let combined = WhereStatement::combine(&WhereStatement::new(), &second);
        assert_eq!(combined, second);
    }

    #[test]
    fn test_wildcard_wrapping() {
        assert_eq!(Comparison::Begins.wrap_wildcards("Wi"), "Wi%");
        assert_eq!(Comparison::Ends.wrap_wildcards("et"), "%et");
        assert_eq!(Comparison::Like.wrap_wildcards("dg"), "%dg%");
        assert_eq!(Comparison::NotLike.wrap_wildcards("dg"), "%dg%");
        assert_eq!(Comparison::Equals.wrap_wildcards("x"), "x");
        assert!(!Comparison::In.uses_wildcards());
    }

    // =========================================================================
    // Property Tests
    // =========================================================================

    fn clause_strategy() -> impl Strategy<Value = WhereClause> {
        ("[a-z]{1,8}", any::<i64>(), prop::collection::vec(any::<i64>(), 0..3)).prop_map(
            |(field, value, subs)| {
                let mut clause = WhereClause::new(field, Comparison::Equals, value);
                for sub in subs {
                    clause.add_subclause(LogicOperator::Or, Comparison::Equals, sub);
                }
                clause
            },
        )
    }

    fn statement_strategy() -> impl Strategy<Value = WhereStatement> {
        prop::collection::vec(prop::collection::vec(clause_strategy(), 1..4), 1..4)
            .prop_map(|levels| WhereStatement { levels })
    }

    proptest! {
        #[test]
        fn prop_copy_equals_original_and_is_independent(statement in statement_strategy()) {
            let snapshot = statement.clone();
            let mut copy = WhereStatement::copy(&statement);
            prop_assert_eq!(&copy, &statement);

            for level in copy.levels.iter_mut() {
                for clause in level.iter_mut() {
                    clause.field.push_str("_changed");
                    clause.sub_clauses.push(SubClause::new(LogicOperator::And, Comparison::Equals, 0));
                }
            }
            copy.add(eq("extra", 1)).unwrap();

            prop_assert_eq!(&statement, &snapshot);
            prop_assert_ne!(&copy, &statement);
        }

        #[test]
        fn prop_combine_preserves_level_count(
            first in statement_strategy(),
            second in statement_strategy(),
        ) {
            let combined = WhereStatement::combine(&first, &second);
            let added: usize = second.levels().iter().map(Vec::len).sum();

            prop_assert_eq!(combined.level_count(), first.level_count());
            for (merged, original) in combined.levels().iter().zip(first.levels()) {
                prop_assert_eq!(merged.len(), original.len() + added);
            }
        }
    }
}
