use std::fmt;
use std::marker::PhantomData;

use crate::datatype::{Properties, Value};
use crate::descriptor::{ResourceDescriptor, describe};
use crate::driver::{Driver, installed_driver};
use crate::error::Result;
use crate::query::Query;
use crate::registry::Model;

/// One instance of the resource type `M`: a bag of properties.
///
/// Properties are stored as given. Checking them against the declared column
/// types happens when a driver serializes the instance. Persistence goes
/// through a driver, either the installed one (`save`, `find`, ...) or one
/// passed in (`save_with`, `find_with`, ...); the instance itself keeps no
/// storage state.
pub struct Resource<M: Model> {
    properties: Properties,
    model: PhantomData<fn() -> M>,
}

impl<M: Model> Resource<M> {
    pub fn new() -> Self {
        Self::from(Properties::new())
    }
    pub fn from_properties<K, V, I>(bag: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::from(bag.into_iter().map(|(k, v)| (k.into(), v.into())).collect::<Properties>())
    }
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }
    pub fn properties(&self) -> &Properties {
        &self.properties
    }
    pub fn into_properties(self) -> Properties {
        self.properties
    }
    pub fn describe() -> Result<ResourceDescriptor> {
        describe::<M>()
    }

    // ------------- Instance operations -------------
    pub async fn save(&self) -> Result<Value> {
        let driver = installed_driver()?;
        self.save_with(driver.as_ref()).await
    }
    pub async fn save_with(&self, driver: &dyn Driver) -> Result<Value> {
        driver.save(&describe::<M>()?, &self.properties).await
    }
    pub async fn remove(&self) -> Result<()> {
        let driver = installed_driver()?;
        self.remove_with(driver.as_ref()).await
    }
    pub async fn remove_with(&self, driver: &dyn Driver) -> Result<()> {
        driver.remove(&describe::<M>()?, &self.properties).await
    }
    /// Reloads this instance by primary key into a fresh instance.
    pub async fn find(&self) -> Result<Self> {
        let driver = installed_driver()?;
        self.find_with(driver.as_ref()).await
    }
    pub async fn find_with(&self, driver: &dyn Driver) -> Result<Self> {
        driver.find(&describe::<M>()?, &self.properties).await.map(Self::from)
    }

    // ------------- Static operations -------------
    pub async fn create() -> Result<()> {
        let driver = installed_driver()?;
        Self::create_with(driver.as_ref()).await
    }
    pub async fn create_with(driver: &dyn Driver) -> Result<()> {
        driver.create(&describe::<M>()?).await
    }
    pub async fn find_all(query: &Query) -> Result<Vec<Self>> {
        let driver = installed_driver()?;
        Self::find_all_with(driver.as_ref(), query).await
    }
    pub async fn find_all_with(driver: &dyn Driver, query: &Query) -> Result<Vec<Self>> {
        let rows = driver.find_all(&describe::<M>()?, query).await?;
        Ok(rows.into_iter().map(Self::from).collect())
    }
}

impl<M: Model> From<Properties> for Resource<M> {
    fn from(properties: Properties) -> Self {
        Self { properties, model: PhantomData }
    }
}

impl<M: Model> Default for Resource<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Clone for Resource<M> {
    fn clone(&self) -> Self {
        Self::from(self.properties.clone())
    }
}

impl<M: Model> PartialEq for Resource<M> {
    fn eq(&self, other: &Self) -> bool {
        self.properties == other.properties
    }
}

impl<M: Model> fmt::Debug for Resource<M> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct(std::any::type_name::<M>()).field("properties", &self.properties).finish()
    }
}
