//! Ormlet – a small object-relational mapper with pluggable storage drivers.
//!
//! Ormlet maps *resource types* onto storage:
//! * A resource type is any type implementing [`registry::Model`]. Its storage
//!   name and fields are declared in a process-wide registry, either from the
//!   [`registry::Model::declare`] hook or through [`registry::declare`].
//! * A [`descriptor::ResourceDescriptor`] is the normalized form of those
//!   declarations: a name, ordered typed columns and exactly one primary key
//!   (an implicit numeric `id` when none was declared).
//! * A [`resource::Resource`] is one instance: a bag of named
//!   [`datatype::Value`]s that can be saved, reloaded, removed and searched.
//! * A [`query::Query`] is a conjunction of `(field, operator, value)` filters,
//!   built in code or parsed from text such as `age > 5 and name like "Jo"`.
//!
//! ## Modules
//! * [`datatype`] – Column types, values, and their SQL and JSON mappings.
//! * [`registry`] – Field declarations, merged per resource type.
//! * [`descriptor`] – Validation and normalization of declarations.
//! * [`query`] / [`filter`] – Filter queries and their textual syntax (`filter.pest`).
//! * [`driver`] – The async [`driver::Driver`] contract and the installed driver slot.
//! * [`persist`] – SQLite driver.
//! * [`remote`] – HTTP driver for a key-JSON store.
//! * [`server`] – The key-JSON store itself, served by the `ormlet-store` binary.
//! * [`settings`] – Layered configuration (TOML file plus `ORMLET_*` variables).
//!
//! ## Quick Start
//! ```no_run
//! use ormlet::{Column, Model, Query, Resource, SqliteDriver};
//!
//! struct User;
//! impl Model for User {
//!     fn declare(class: &mut ormlet::ClassMetadata) {
//!         class.model_name("user").field("name", Column::text()).field("age", Column::number());
//!     }
//! }
//!
//! # async fn run() -> ormlet::Result<()> {
//! let driver = SqliteDriver::open_in_memory()?;
//! Resource::<User>::create_with(&driver).await?;
//! let id = Resource::<User>::new().with("name", "John").with("age", 40).save_with(&driver).await?;
//! let mut query = Query::new();
//! query.where_("age").gt(18);
//! let adults = Resource::<User>::find_all_with(&driver, &query).await?;
//! assert_eq!(adults[0].get("id"), Some(&id));
//! # Ok(())
//! # }
//! ```
//!
//! ## Drivers
//! Every resource operation comes in two forms: `save`, `find`, ... use the
//! driver installed with [`driver::use_driver`], while `save_with`,
//! `find_with`, ... take one explicitly.

pub mod datatype;
pub mod descriptor;
pub mod driver;
pub mod error;
pub mod filter;
pub mod persist;
pub mod query;
pub mod registry;
pub mod remote;
pub mod resource;
pub mod server;
pub mod settings;

pub use datatype::{ColumnType, Properties, Value};
pub use descriptor::{ResourceDescriptor, describe};
pub use driver::{Driver, installed_driver, use_driver};
pub use error::{OrmletError, Result};
pub use persist::SqliteDriver;
pub use query::{BoundQuery, Clause, Filter, Operator, Query};
pub use registry::{
    ClassMetadata, Column, ColumnDescriptor, ColumnPatch, Model, declare, declare_field, declare_model_name,
    raw_metadata,
};
pub use remote::HttpDriver;
pub use resource::Resource;
pub use settings::Settings;
