//! SQLite driver.
//!
//! Each resource is one table named after the resource, with one column per
//! declared field. The connection lives behind an async mutex and every
//! statement runs on the blocking pool, since rusqlite is synchronous.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use tokio::sync::Mutex;
use tracing::debug;

use crate::datatype::{Properties, Value};
use crate::descriptor::ResourceDescriptor;
use crate::driver::Driver;
use crate::error::{Operation, OrmletError, Result};
use crate::query::{BoundQuery, Operator, Query};

// ------------- SQL text -------------
fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn column_list(descriptor: &ResourceDescriptor) -> String {
    descriptor.fields().iter().map(|f| quote(&f.name)).collect::<Vec<_>>().join(", ")
}

/// The primary column is declared INTEGER so that it aliases the rowid and
/// SQLite assigns a key when none is given.
pub fn create_table_sql(descriptor: &ResourceDescriptor) -> String {
    let columns = descriptor
        .fields()
        .iter()
        .map(|column| {
            let mut definition = quote(&column.name);
            if column.primary {
                definition.push_str(" INTEGER PRIMARY KEY");
                return definition;
            }
            definition.push(' ');
            definition.push_str(column.column_type.sql_type());
            if column.not_null {
                definition.push_str(" NOT NULL");
            }
            if column.unique {
                definition.push_str(" UNIQUE");
            }
            definition
        })
        .collect::<Vec<_>>()
        .join(",\n    ");
    format!("CREATE TABLE IF NOT EXISTS {} (\n    {}\n)", quote(descriptor.name()), columns)
}

fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len() + 2);
    escaped.push('%');
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Translates a bound query into a `WHERE` clause (empty when there are no
/// filters) and its parameters.
pub fn where_clause(query: &BoundQuery) -> (String, Vec<Value>) {
    let mut conditions = Vec::with_capacity(query.filters().len());
    let mut params = Vec::with_capacity(query.filters().len());
    for filter in query.filters() {
        let column = quote(&filter.column);
        match filter.operator {
            Operator::Like => {
                conditions.push(format!("{} LIKE ? ESCAPE '\\'", column));
                params.push(Value::Text(escape_like(filter.value.as_str().unwrap_or_default())));
            }
            operator => {
                let symbol = match operator {
                    Operator::NotEq => "<>",
                    other => other.token(),
                };
                conditions.push(format!("{} {} ?", column, symbol));
                params.push(filter.value.clone());
            }
        }
    }
    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }
}

fn read_row(descriptor: &ResourceDescriptor, row: &rusqlite::Row) -> Result<Properties> {
    let mut properties = Properties::new();
    for (i, column) in descriptor.fields().iter().enumerate() {
        properties.insert(column.name.clone(), column.column_type.from_sql(row.get_ref(i)?)?);
    }
    Ok(properties)
}

// ------------- Persistence -------------
pub struct SqliteDriver {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteDriver {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
    pub fn from_connection(connection: Connection) -> Result<Self> {
        // like is a substring test that respects case, same as in memory
        connection.execute_batch("PRAGMA case_sensitive_like = ON;")?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)) })
    }

    async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let guard = connection.blocking_lock();
            f(&guard)
        })
        .await
        .map_err(|e| OrmletError::Persistence(format!("blocking task failed: {}", e)))?
    }

    async fn create_table(&self, descriptor: &ResourceDescriptor) -> Result<()> {
        descriptor.require_numeric_primary()?;
        let sql = create_table_sql(descriptor);
        debug!(%sql, "creating table");
        self.with_connection(move |c| {
            c.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }

    async fn store(&self, descriptor: &ResourceDescriptor, properties: &Properties) -> Result<Value> {
        let key = descriptor.primary_value(properties)?;
        let values = descriptor.row_values(properties)?;
        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            quote(descriptor.name()),
            column_list(descriptor),
            placeholders
        );
        debug!(%sql, "storing item");
        self.with_connection(move |c| {
            c.prepare_cached(&sql)?.execute(params_from_iter(values.iter()))?;
            Ok(match key {
                Some(key) => key,
                None => Value::Number(c.last_insert_rowid() as f64),
            })
        })
        .await
    }

    async fn delete(&self, descriptor: &ResourceDescriptor, properties: &Properties) -> Result<()> {
        let key = descriptor.key_of(properties)?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote(descriptor.name()),
            quote(&descriptor.primary().name)
        );
        debug!(%sql, %key, "removing item");
        self.with_connection(move |c| {
            c.prepare_cached(&sql)?.execute([&key])?;
            Ok(())
        })
        .await
    }

    async fn fetch(&self, descriptor: &ResourceDescriptor, properties: &Properties) -> Result<Properties> {
        let key = descriptor.key_of(properties)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            column_list(descriptor),
            quote(descriptor.name()),
            quote(&descriptor.primary().name)
        );
        debug!(%sql, %key, "fetching item");
        let descriptor = descriptor.clone();
        self.with_connection(move |c| {
            let mut statement = c.prepare_cached(&sql)?;
            let found = statement
                .query_row([&key], |row| Ok(read_row(&descriptor, row)))
                .optional()?;
            match found {
                Some(properties) => properties,
                None => Err(OrmletError::NotFound {
                    resource: descriptor.name().to_string(),
                    key: key.to_string(),
                }),
            }
        })
        .await
    }

    async fn fetch_all(&self, descriptor: &ResourceDescriptor, query: &Query) -> Result<Vec<Properties>> {
        let bound = query.bind(descriptor)?;
        let (conditions, params) = where_clause(&bound);
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {}",
            column_list(descriptor),
            quote(descriptor.name()),
            conditions,
            quote(&descriptor.primary().name)
        );
        debug!(%sql, filters = params.len(), "fetching items");
        let descriptor = descriptor.clone();
        self.with_connection(move |c| {
            let mut statement = c.prepare_cached(&sql)?;
            let mut rows = statement.query(params_from_iter(params.iter()))?;
            let mut found = Vec::new();
            while let Some(row) = rows.next()? {
                found.push(read_row(&descriptor, row)?);
            }
            Ok(found)
        })
        .await
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }
    async fn create(&self, descriptor: &ResourceDescriptor) -> Result<()> {
        self.create_table(descriptor).await.map_err(|e| e.during(Operation::Create))
    }
    async fn save(&self, descriptor: &ResourceDescriptor, properties: &Properties) -> Result<Value> {
        self.store(descriptor, properties).await.map_err(|e| e.during(Operation::Save))
    }
    async fn remove(&self, descriptor: &ResourceDescriptor, properties: &Properties) -> Result<()> {
        self.delete(descriptor, properties).await.map_err(|e| e.during(Operation::Remove))
    }
    async fn find(&self, descriptor: &ResourceDescriptor, properties: &Properties) -> Result<Properties> {
        self.fetch(descriptor, properties).await.map_err(|e| e.during(Operation::Fetch))
    }
    async fn find_all(&self, descriptor: &ResourceDescriptor, query: &Query) -> Result<Vec<Properties>> {
        self.fetch_all(descriptor, query).await.map_err(|e| e.during(Operation::Fetch))
    }
}
