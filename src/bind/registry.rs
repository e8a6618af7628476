// Type factory registry.
//
// Maps a schema `mappingClass` name to a factory producing a freshly
// constructed zero-value destination instance. The decode engine pulls
// instances out of here for every object node it materializes.

use std::collections::HashMap;

use log::trace;

use crate::bind::access::JsonObject;
use crate::internal::error::{Error, Result};

type Factory = fn() -> Box<dyn JsonObject>;

fn construct<T: JsonObject + Default + 'static>() -> Box<dyn JsonObject> {
    Box::new(T::default())
}

/// Registry of destination type factories, keyed by mapping-class name.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    factories: HashMap<String, Factory>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers a destination type under a mapping-class name. A second
    /// registration under the same name replaces the first.
    pub fn register<T: JsonObject + Default + 'static>(&mut self, class: &str) {
        trace!("registered mapping class '{}'", class);
        self.factories.insert(class.to_string(), construct::<T>);
    }

    /// True when a factory is registered for the class name.
    pub fn contains(&self, class: &str) -> bool {
        self.factories.contains_key(class)
    }

    /// Constructs a fresh zero-value instance of the named class.
    pub fn instantiate(&self, class: &str) -> Result<Box<dyn JsonObject>> {
        match self.factories.get(class) {
            Some(factory) => Ok(factory()),
            None => Err(Error::BindingError(format!(
                "No type registered for mapping class '{}'",
                class
            ))),
        }
    }
}
