//! SQL utilities for Record Store
//!
//! Provides SQL generation, sanitization, and command building utilities.

pub mod command;
pub mod condition;
pub mod ddl;
pub mod literal;
pub mod sanitize;

pub use command::{Command, CommandBuilder, SelectQuery};
pub use condition::{Parameter, ParameterSet, build_order_by_clause, build_where_clause};
pub use ddl::DdlGenerator;
pub use literal::{Literal, Placeholder, format_literal};
pub use sanitize::{quote_identifier, quote_qualified, validate_target};
