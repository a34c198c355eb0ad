//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::config::{Configuration, ConfigurationBuilder, Settings};
pub use crate::connection::{ConnectionCloseGuard, ConnectionState, TransactionAwareConnection};
pub use crate::context::{ContextScope, ExecutionContext};
pub use crate::driver::{
    BindValue, ConnectionFactory, DriverConnection, DriverResult, DriverStatement,
};
pub use crate::error::SqlMapperError;
pub use crate::executor::StatementExecutor;
pub use crate::mapping::{
    MappedStatement, MappedStatementBuilder, ParameterMapping, ResultMap, SqlCommand,
    StatementProvider, StatementRegistry,
};
pub use crate::record::{ParameterObject, Property, Record};
pub use crate::results::{DbRow, RowBounds};
pub use crate::session::{Session, SessionFactory};
pub use crate::translation::PlaceholderStyle;
pub use crate::type_handler::{EnumAdapter, EnumEncoding, TypeAdapter, TypeAdapterRegistry};
pub use crate::types::{DbValue, IsolationLevel, ParameterMode, SqlType, SqlValue, TypeKey};
