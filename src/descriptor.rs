//! Resource descriptors.
//!
//! A descriptor is the normalized view of what a resource type declared: a
//! storage name and an ordered list of columns with exactly one primary key.
//! When no field was declared primary a numeric `id` column is put first.
//! Descriptors are derived again on every call to [`describe`], never cached,
//! so declarations made later are always picked up.

use lazy_static::lazy_static;
use regex::Regex;

use crate::datatype::{ColumnType, Properties, Value};
use crate::error::{OrmletError, Result};
use crate::registry::{ClassMetadata, ColumnDescriptor, Model, raw_metadata};

/// Name of the primary column added when none was declared.
pub const IMPLICIT_PRIMARY: &str = "id";

lazy_static! {
    // storage and field names end up in SQL identifiers and URL segments
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    name: String,
    fields: Vec<ColumnDescriptor>,
    primary: usize,
}

/// Describes the resource type `M` from its current registry entry.
pub fn describe<M: Model>() -> Result<ResourceDescriptor> {
    ResourceDescriptor::from_metadata(&raw_metadata::<M>())
}

impl ResourceDescriptor {
    pub fn from_metadata(class: &ClassMetadata) -> Result<Self> {
        let name = class.name().ok_or_else(|| {
            OrmletError::Config(format!("missing model name for {}", class.type_name()))
        })?;
        if name.is_empty() {
            return Err(OrmletError::Config(format!("empty model name for {}", class.type_name())));
        }
        if !IDENTIFIER.is_match(name) {
            return Err(OrmletError::Config(format!("model name '{}' is not a valid identifier", name)));
        }
        let mut fields = Vec::with_capacity(class.fields().len() + 1);
        let declared_primaries = class.fields().iter().filter(|f| f.primary).count();
        match declared_primaries {
            0 => {
                if class.get(IMPLICIT_PRIMARY).is_some() {
                    return Err(OrmletError::Config(format!(
                        "{} declares a field '{}' but no primary key, the implicit key would collide with it",
                        name, IMPLICIT_PRIMARY
                    )));
                }
                let mut id = ColumnDescriptor::new(IMPLICIT_PRIMARY, ColumnType::Number);
                id.primary = true;
                fields.push(id);
            }
            1 => (),
            n => {
                return Err(OrmletError::Config(format!("{} declares {} primary keys, only one is allowed", name, n)));
            }
        }
        for field in class.fields() {
            if !IDENTIFIER.is_match(&field.name) {
                return Err(OrmletError::Config(format!(
                    "field name '{}' of {} is not a valid identifier",
                    field.name, name
                )));
            }
            let mut column = field.clone();
            if let Some(default) = &field.default {
                let coerced = field.column_type.coerce(default).map_err(|e| {
                    OrmletError::Config(format!("default of {}.{}: {}", name, field.name, e))
                })?;
                column.default = Some(coerced);
            }
            fields.push(column);
        }
        let primary = fields.iter().position(|f| f.primary).unwrap_or(0);
        Ok(Self { name: name.to_string(), fields, primary })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn fields(&self) -> &[ColumnDescriptor] {
        &self.fields
    }
    pub fn primary(&self) -> &ColumnDescriptor {
        &self.fields[self.primary]
    }
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Storage backends key records by number; anything else cannot be provisioned.
    pub fn require_numeric_primary(&self) -> Result<()> {
        let primary = self.primary();
        if primary.column_type != ColumnType::Number {
            return Err(OrmletError::Config(format!(
                "{} has no numeric primary key ('{}' is {})",
                self.name, primary.name, primary.column_type
            )));
        }
        Ok(())
    }

    /// The primary key carried by `properties`, coerced to the key's type.
    pub fn primary_value(&self, properties: &Properties) -> Result<Option<Value>> {
        let primary = self.primary();
        match properties.get(&primary.name) {
            Some(value) if !value.is_null() => primary.column_type.coerce(value).map(Some),
            _ => Ok(None),
        }
    }

    /// Like [`primary_value`](Self::primary_value), for operations that cannot
    /// proceed without a key.
    pub fn key_of(&self, properties: &Properties) -> Result<Value> {
        self.primary_value(properties)?.ok_or_else(|| {
            OrmletError::Config(format!("{} instance has no value for primary key '{}'", self.name, self.primary().name))
        })
    }

    /// One value per column, in column order, ready to be serialized.
    ///
    /// A property missing from the instance falls back to the declared
    /// default, then to the zero value of the column type. The primary key is
    /// the exception: without a value it stays null so the backend assigns one.
    pub fn row_values(&self, properties: &Properties) -> Result<Vec<Value>> {
        self.fields
            .iter()
            .map(|column| match properties.get(&column.name) {
                Some(value) if !value.is_null() => column.column_type.coerce(value),
                _ => Ok(match (&column.default, column.primary) {
                    (Some(default), _) => default.clone(),
                    (None, true) => Value::Null,
                    (None, false) => column.column_type.zero(),
                }),
            })
            .collect()
    }
}
