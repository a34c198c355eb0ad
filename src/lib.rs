//! Streaming, transaction-aware execution of mapped SQL statements.
//!
//! A [`SessionFactory`] opens [`Session`]s over one [`Configuration`]. Each session owns an
//! execution context holding at most one driver connection; statements run through the
//! [`StatementExecutor`], which binds parameters with the registered type adapters and turns
//! driver rows into [`Record`]s (flat, or grouped through nested result maps) as a lazy stream.
//!
//! Drivers plug in through the traits in [`driver`]. `SQLite` (rusqlite) and Postgres
//! (tokio-postgres) backends ship behind the `sqlite` and `postgres` features.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reactive_sql_mapper::prelude::*;
//! use reactive_sql_mapper::sqlite::SqliteConnectionFactory;
//!
//! # async fn demo() -> Result<(), SqlMapperError> {
//! let factory = SqliteConnectionFactory::builder("app.db".into()).build().await?;
//! let config = Configuration::builder(Arc::new(factory))
//!     .statement(MappedStatement::select(
//!         "blogById",
//!         "select id, title from blog where id = #{id}",
//!     ))
//!     .build()?;
//! let mut session = SessionFactory::new(config).open_session();
//! let blog = session.select_one("blogById", 1).await?;
//! session.close().await?;
//! # let _ = blog;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod context;
pub mod driver;
pub mod error;
pub mod executor;
pub mod mapping;
pub mod prelude;
pub mod record;
pub mod results;
pub mod session;
pub mod translation;
pub mod type_handler;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::{Configuration, ConfigurationBuilder, Settings};
pub use error::SqlMapperError;
pub use executor::StatementExecutor;
pub use record::{ParameterObject, Property, Record};
pub use session::{Session, SessionFactory};
pub use types::{DbValue, IsolationLevel, SqlType, SqlValue, TypeKey};
