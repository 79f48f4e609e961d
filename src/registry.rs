//! Field registry.
//!
//! Every resource type owns one entry in a process-wide registry, keyed by
//! its [`TypeId`]. Declarations are patches: they can arrive in any order,
//! patches to different fields never interact, and patches to the same field
//! merge key by key (a later `unique` does not erase an earlier type).
//!
//! The registry is expected to be filled while the program starts, before
//! any concurrent use of the resources it describes.

use std::any::{TypeId, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::marker::PhantomData;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lazy_static::lazy_static;
use seahash::SeaHasher;

use crate::datatype::{ColumnType, Value};

pub type TypeHasher = BuildHasherDefault<SeaHasher>;

lazy_static! {
    static ref REGISTRY: RwLock<HashMap<TypeId, ClassMetadata, TypeHasher>> =
        RwLock::new(HashMap::default());
}

/// A storage-backed resource type.
///
/// The optional `declare` hook runs once, when the registry first sees the
/// type, and is the natural place to keep a type's declarations. It runs
/// without the registry lock, so it may call [`declare`] or
/// [`describe`](crate::describe) itself:
///
/// ```
/// use ormlet::{ClassMetadata, Column, Model};
/// struct User;
/// impl Model for User {
///     fn declare(class: &mut ClassMetadata) {
///         class
///             .model_name("user")
///             .field("id", Column::number().primary())
///             .field("name", Column::text().not_null());
///     }
/// }
/// ```
pub trait Model: Send + Sync + 'static {
    fn declare(_class: &mut ClassMetadata) {}
}

// ------------- Column Descriptor -------------
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: ColumnType,
    pub unique: bool,
    pub not_null: bool,
    pub primary: bool,
    pub default: Option<Value>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            unique: false,
            not_null: false,
            primary: false,
            default: None,
        }
    }
    pub fn apply(&mut self, patch: &ColumnPatch) {
        if let Some(column_type) = patch.column_type {
            self.column_type = column_type;
        }
        if let Some(unique) = patch.unique {
            self.unique = unique;
        }
        if let Some(not_null) = patch.not_null {
            self.not_null = not_null;
        }
        if let Some(primary) = patch.primary {
            self.primary = primary;
        }
        if let Some(default) = &patch.default {
            self.default = Some(default.clone());
        }
    }
}

// ------------- Column Patch -------------
/// A partial column declaration. Unset keys leave the existing descriptor
/// alone when the patch is merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnPatch {
    pub column_type: Option<ColumnType>,
    pub unique: Option<bool>,
    pub not_null: Option<bool>,
    pub primary: Option<bool>,
    pub default: Option<Value>,
}

/// Shorter name for building patches at declaration sites.
pub type Column = ColumnPatch;

impl ColumnPatch {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn of_type(column_type: ColumnType) -> Self {
        Self { column_type: Some(column_type), ..Self::default() }
    }
    pub fn text() -> Self {
        Self::of_type(ColumnType::Text)
    }
    pub fn number() -> Self {
        Self::of_type(ColumnType::Number)
    }
    pub fn boolean() -> Self {
        Self::of_type(ColumnType::Boolean)
    }
    pub fn object() -> Self {
        Self::of_type(ColumnType::Object)
    }
    pub fn column_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = Some(column_type);
        self
    }
    pub fn unique(mut self) -> Self {
        self.unique = Some(true);
        self
    }
    pub fn not_null(mut self) -> Self {
        self.not_null = Some(true);
        self
    }
    pub fn primary(mut self) -> Self {
        self.primary = Some(true);
        self
    }
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
    /// Folds a later patch into this one; its set keys win.
    pub fn merge(&mut self, later: &ColumnPatch) {
        if later.column_type.is_some() {
            self.column_type = later.column_type;
        }
        if later.unique.is_some() {
            self.unique = later.unique;
        }
        if later.not_null.is_some() {
            self.not_null = later.not_null;
        }
        if later.primary.is_some() {
            self.primary = later.primary;
        }
        if later.default.is_some() {
            self.default = later.default.clone();
        }
    }
}

// ------------- Class Metadata -------------
/// Everything declared for one resource type, fields in first-declaration order.
#[derive(Debug, Clone)]
pub struct ClassMetadata {
    type_name: &'static str,
    model_name: Option<String>,
    fields: Vec<ColumnDescriptor>,
    // the merged patch per field, so one set of declarations can be replayed onto another
    patches: Vec<(String, ColumnPatch)>,
    hooked: bool,
}

impl ClassMetadata {
    fn new(type_name: &'static str) -> Self {
        Self { type_name, model_name: None, fields: Vec::new(), patches: Vec::new(), hooked: false }
    }
    pub fn model_name(&mut self, name: &str) -> &mut Self {
        self.model_name = Some(name.to_string());
        self
    }
    pub fn field(&mut self, name: &str, patch: ColumnPatch) -> &mut Self {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.apply(&patch),
            None => {
                let mut column = ColumnDescriptor::new(name, ColumnType::Text);
                column.apply(&patch);
                self.fields.push(column);
            }
        }
        match self.patches.iter_mut().find(|(field, _)| field == name) {
            Some((_, merged)) => merged.merge(&patch),
            None => self.patches.push((name.to_string(), patch)),
        }
        self
    }
    /// The storage name, if one was declared.
    pub fn name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
    pub fn fields(&self) -> &[ColumnDescriptor] {
        &self.fields
    }
    pub fn get(&self, field: &str) -> Option<&ColumnDescriptor> {
        self.fields.iter().find(|f| f.name == field)
    }

    /// Replays `later` on top of these declarations.
    fn absorb(&mut self, later: ClassMetadata) {
        if let Some(name) = later.model_name {
            self.model_name = Some(name);
        }
        for (name, patch) in later.patches {
            self.field(&name, patch);
        }
    }
}

thread_local! {
    // types whose declare hook is running on this thread
    static DECLARING: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

struct Declaring(TypeId);

impl Declaring {
    fn enter(id: TypeId) -> Self {
        DECLARING.with(|d| d.borrow_mut().push(id));
        Declaring(id)
    }
    fn active(id: TypeId) -> bool {
        DECLARING.with(|d| d.borrow().contains(&id))
    }
}

impl Drop for Declaring {
    fn drop(&mut self) {
        DECLARING.with(|d| d.borrow_mut().retain(|id| *id != self.0));
    }
}

// A poisoned lock can only come from a panic inside a merge, which leaves
// the map consistent, so the guard is recovered instead of propagated.
fn registry_read() -> RwLockReadGuard<'static, HashMap<TypeId, ClassMetadata, TypeHasher>> {
    REGISTRY.read().unwrap_or_else(PoisonError::into_inner)
}

fn registry_write() -> RwLockWriteGuard<'static, HashMap<TypeId, ClassMetadata, TypeHasher>> {
    REGISTRY.write().unwrap_or_else(PoisonError::into_inner)
}

/// Runs `M::declare` without holding the registry lock, so the hook may use
/// the registry itself. Registry calls the hook makes for `M` land in the
/// entry directly and are replayed after the hook's own declarations.
fn run_declare_hook<M: Model>(id: TypeId) {
    let mut hooked = ClassMetadata::new(type_name::<M>());
    {
        let _declaring = Declaring::enter(id);
        M::declare(&mut hooked);
    }
    hooked.hooked = true;
    let mut registry = registry_write();
    match registry.remove(&id) {
        // another thread got there first, with the same declarations
        Some(existing) if existing.hooked => {
            registry.insert(id, existing);
        }
        Some(existing) => {
            hooked.absorb(existing);
            registry.insert(id, hooked);
        }
        None => {
            registry.insert(id, hooked);
        }
    }
}

fn with_class<M: Model, T, F: FnOnce(&mut ClassMetadata) -> T>(f: F) -> T {
    let id = TypeId::of::<M>();
    let hooked = registry_read().get(&id).is_some_and(|class| class.hooked);
    if !hooked && !Declaring::active(id) {
        run_declare_hook::<M>(id);
    }
    let mut registry = registry_write();
    f(registry.entry(id).or_insert_with(|| ClassMetadata::new(type_name::<M>())))
}

/// Merges `patch` into the field called `name`, creating it as a text column
/// when it has not been seen before.
pub fn declare_field<M: Model>(name: &str, patch: ColumnPatch) {
    with_class::<M, _, _>(|class| {
        class.field(name, patch);
    });
}

/// Records the storage name of the resource.
pub fn declare_model_name<M: Model>(name: &str) {
    with_class::<M, _, _>(|class| {
        class.model_name(name);
    });
}

/// A snapshot of everything declared so far, for inspection.
pub fn raw_metadata<M: Model>() -> ClassMetadata {
    with_class::<M, _, _>(|class| class.clone())
}

/// Fluent handle over [`declare_field`] and [`declare_model_name`].
pub fn declare<M: Model>() -> Declaration<M> {
    Declaration { model: PhantomData }
}

pub struct Declaration<M> {
    model: PhantomData<fn() -> M>,
}

impl<M: Model> Declaration<M> {
    pub fn model_name(self, name: &str) -> Self {
        declare_model_name::<M>(name);
        self
    }
    pub fn field(self, name: &str, patch: ColumnPatch) -> Self {
        declare_field::<M>(name, patch);
        self
    }
}
