//! Wrap-in schemas: named, reusable input structures.

use std::collections::BTreeMap;

use crate::metadata::{ClassKind, HandlerMeta};
use crate::validate::rules::{PropertyDescriptor, PropertyError, Requirement};

/// One wrap-in: a titled set of property descriptors.
#[derive(Debug, Clone, PartialEq)]
pub struct WrapInSchema {
    pub name: String,
    pub title: String,
    pub properties: Vec<PropertyDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WrapInError {
    #[error("wrap-in class has no namespace")]
    WithoutNamespace,

    #[error("wrap-in {0} has no title")]
    TitleMissing(String),

    #[error("wrap-in {0} declared twice")]
    Duplicated(String),

    #[error("wrap-in {class}: {source}")]
    Property {
        class: String,
        #[source]
        source: PropertyError,
    },

    #[error("wrap-in {class} property {property} refers to itself")]
    Recursive { class: String, property: String },

    #[error("wrap-in {class} property {property} refers to unknown wrap-in {target}")]
    NotExists {
        class: String,
        property: String,
        target: String,
    },
}

/// All wrap-ins known to the kernel, keyed by class name.
#[derive(Debug, Clone, Default)]
pub struct WrapInRegistry {
    schemas: BTreeMap<String, WrapInSchema>,
}

impl WrapInRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from every wrap-in class in `metas`.
    ///
    /// Nested references are checked once all schemas are known.
    pub fn assemble(metas: &[HandlerMeta]) -> Result<Self, WrapInError> {
        let mut registry = Self::new();
        for meta in metas.iter().filter(|m| m.class.kind == ClassKind::WrapIn) {
            let name = meta.class.namespace.trim();
            if name.is_empty() {
                return Err(WrapInError::WithoutNamespace);
            }
            let title = meta
                .class
                .doc
                .text("TITLE")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| WrapInError::TitleMissing(name.to_string()))?;

            let mut properties = Vec::with_capacity(meta.properties.len());
            for prop in &meta.properties {
                let descriptor =
                    PropertyDescriptor::assemble(&prop.name, &prop.doc, None, Requirement::Never)
                        .map_err(|source| WrapInError::Property {
                            class: name.to_string(),
                            source,
                        })?;
                if descriptor.wrapin().is_some_and(|(target, _)| target == name) {
                    return Err(WrapInError::Recursive {
                        class: name.to_string(),
                        property: prop.name.clone(),
                    });
                }
                properties.push(descriptor);
            }

            registry.insert(WrapInSchema {
                name: name.to_string(),
                title: title.to_string(),
                properties,
            })?;
        }
        registry.check_references()?;

        tracing::debug!(wrapins = registry.schemas.len(), "Wrap-in schemas assembled");
        Ok(registry)
    }

    pub fn insert(&mut self, schema: WrapInSchema) -> Result<(), WrapInError> {
        if self.schemas.contains_key(&schema.name) {
            return Err(WrapInError::Duplicated(schema.name));
        }
        self.schemas.insert(schema.name.clone(), schema);
        Ok(())
    }

    fn check_references(&self) -> Result<(), WrapInError> {
        for schema in self.schemas.values() {
            for prop in &schema.properties {
                if let Some((target, _)) = prop.wrapin() {
                    if !self.contains(target) {
                        return Err(WrapInError::NotExists {
                            class: schema.name.clone(),
                            property: prop.name.clone(),
                            target: target.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&WrapInSchema> {
        self.schemas.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
