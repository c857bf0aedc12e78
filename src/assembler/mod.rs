//! Metadata assembler: turns handler metadata into the route registry.
//!
//! # Data Flow
//! ```text
//! HandlerMeta[]
//!     → wrap-in classes   → WrapInRegistry (validate::wrapin)
//!     → port classes
//!         → eligibility (namespace, PortCatalog)
//!         → per method: route.rs (expression, verbs) → RegistryBuilder
//!         → settings.rs (normalise + merge four levels) → PortSettings
//!         → arguments (property table + per-method overrides)
//!         → PortDescriptor
//!     → seal() → Registry
//! ```
//!
//! # Design Decisions
//! - Batch and fail-fast: the first structural error aborts the run
//! - Setting keys are resolved through a static table into typed fields;
//!   nothing string-keyed is left for the request path
//! - Domain defaults come from [`KernelConfig`], never from globals

pub mod error;
pub mod route;
pub mod settings;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::KernelConfig;
use crate::http::wrapper::WrapperRegistry;
use crate::metadata::{ClassKind, ClassMeta, DocMeta, HandlerMeta, MethodMeta};
use crate::pipeline::PipeRegistry;
use crate::port::{PortCatalog, PortDescriptor, PortSettings};
use crate::routing::{PropertyTable, Registry, RegistryBuilder};
use crate::validate::rules::split_list;
use crate::validate::{PropertyDescriptor, Requirement, WrapInRegistry};

pub use error::{AssemblyError, Level};
pub use settings::CLEAR;

use route::RouteSpec;
use settings::{Lookups, Scope};

/// Entry point of autonomy classes.
pub const AUTONOMY_HANDLER: &str = "execute";

/// The sealed registry plus the wrap-in schemas it refers to.
#[derive(Debug)]
pub struct Assembly {
    pub registry: Registry,
    pub wrapins: WrapInRegistry,
}

pub struct Assembler<'a> {
    config: &'a KernelConfig,
    catalog: &'a dyn PortCatalog,
    pipes: &'a PipeRegistry,
    wrappers: &'a WrapperRegistry,
}

impl<'a> Assembler<'a> {
    pub fn new(
        config: &'a KernelConfig,
        catalog: &'a dyn PortCatalog,
        pipes: &'a PipeRegistry,
        wrappers: &'a WrapperRegistry,
    ) -> Self {
        Self {
            config,
            catalog,
            pipes,
            wrappers,
        }
    }

    pub fn assemble(&self, metas: &[HandlerMeta]) -> Result<Assembly, AssemblyError> {
        let wrapins = WrapInRegistry::assemble(metas)?;
        let mut builder = RegistryBuilder::new(self.config.kernel.max_param_segments);

        let lookups = Lookups {
            pipes: self.pipes,
            wrappers: self.wrappers,
            wrapins: &wrapins,
        };
        for meta in metas.iter().filter(|m| m.class.kind == ClassKind::Port) {
            self.assemble_class(meta, &lookups, &mut builder)?;
        }

        let registry = builder.seal();
        tracing::info!(
            routes = registry.route_count(),
            ports = registry.port_count(),
            wrapins = wrapins.len(),
            "Assembly complete"
        );
        Ok(Assembly { registry, wrapins })
    }

    fn assemble_class(
        &self,
        meta: &HandlerMeta,
        lookups: &Lookups<'_>,
        builder: &mut RegistryBuilder,
    ) -> Result<(), AssemblyError> {
        let class = meta.class.namespace.trim();
        if class.is_empty() {
            return Err(AssemblyError::ClassWithoutNamespace);
        }

        let properties: PropertyTable = meta
            .properties
            .iter()
            .map(|p| (p.name.clone(), p.clone()))
            .collect();
        builder.register_properties(class, properties.clone());

        if !self.catalog.contains(class) {
            return Err(AssemblyError::InvalidHandler {
                class: class.to_string(),
            });
        }
        if meta.class.doc.flag("NOTROUTE") {
            tracing::debug!(class, "Class excluded from routing");
            return Ok(());
        }

        if meta.class.doc.flag("AUTONOMY") {
            let handler = meta
                .methods
                .iter()
                .find(|m| m.name == AUTONOMY_HANDLER)
                .ok_or_else(|| AssemblyError::AutonomyHandlerMissing {
                    class: class.to_string(),
                    handler: AUTONOMY_HANDLER.to_string(),
                })?;
            return self.assemble_method(&meta.class, class, handler, &properties, lookups, builder);
        }

        for method in &meta.methods {
            self.assemble_method(&meta.class, class, method, &properties, lookups, builder)?;
        }
        Ok(())
    }

    fn assemble_method(
        &self,
        class_meta: &ClassMeta,
        class: &str,
        method: &MethodMeta,
        properties: &PropertyTable,
        lookups: &Lookups<'_>,
        builder: &mut RegistryBuilder,
    ) -> Result<(), AssemblyError> {
        if method.name.starts_with('_') || !method.public || method.doc.flag("NOTROUTE") {
            return Ok(());
        }
        let Some(RouteSpec { template, verbs }) =
            route::resolve(class, &method.name, &class_meta.doc, &method.doc)?
        else {
            return Ok(());
        };

        for verb in &verbs {
            builder
                .register_route(&template, *verb, class, &method.name)
                .map_err(|dup| AssemblyError::DuplicatedRoute {
                    route: template.definition().to_string(),
                    verb: dup.verb,
                    target: format!("{class}@{}", method.name),
                    conflict: dup.existing,
                })?;
        }

        let title = method
            .doc
            .text("TITLE")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AssemblyError::PortWithoutTitle {
                class: class.to_string(),
                method: method.name.clone(),
            })?;

        let scope = Scope {
            class,
            method: &method.name,
            domain: &class_meta.domain,
            class_doc: &class_meta.doc,
            method_doc: &method.doc,
            config: self.config,
        };
        let settings: PortSettings = scope.resolve(lookups)?;
        let arguments = self.arguments(class, method, properties)?;

        builder.register_port(PortDescriptor {
            class: class.to_string(),
            method: method.name.clone(),
            domain: class_meta.domain.clone(),
            title: title.to_string(),
            notes: method.doc.text("NOTES").map(str::to_string),
            route: template.definition().to_string(),
            verbs,
            settings,
            arguments,
            parameters: method.parameters.clone(),
            extra: merged_extra(&class_meta.doc, &method.doc),
        });
        Ok(())
    }

    /// Resolve ARGUMENT names against the class properties.
    fn arguments(
        &self,
        class: &str,
        method: &MethodMeta,
        properties: &PropertyTable,
    ) -> Result<Vec<PropertyDescriptor>, AssemblyError> {
        let names = match method.doc.value("ARGUMENT") {
            Some(Value::String(s)) => split_list(s, ','),
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
            _ => Vec::new(),
        };

        names
            .iter()
            .map(|name| {
                let property = properties.get(name).ok_or_else(|| AssemblyError::ArgumentUndefined {
                    class: class.to_string(),
                    method: method.name.clone(),
                    argument: name.clone(),
                })?;
                let overrides = method.doc.extra_param("ARGUMENT", name);
                PropertyDescriptor::assemble(name, &property.doc, overrides, Requirement::Always).map_err(
                    |source| AssemblyError::Argument {
                        class: class.to_string(),
                        method: method.name.clone(),
                        source,
                    },
                )
            })
            .collect()
    }
}

/// Annotation parameters, method over class.
fn merged_extra(class_doc: &DocMeta, method_doc: &DocMeta) -> BTreeMap<String, Value> {
    let mut extra: BTreeMap<String, Value> = class_doc
        .extra
        .iter()
        .map(|(k, v)| (k.to_ascii_uppercase(), v.clone()))
        .collect();
    for (key, value) in &method_doc.extra {
        extra.insert(key.to_ascii_uppercase(), value.clone());
    }
    extra
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::verb::Verb;
    use crate::port::DeclaredPorts;
    use crate::routing::PathTemplate;
    use serde_json::json;

    fn assemble(config: &KernelConfig, metas: &[HandlerMeta]) -> Result<Assembly, AssemblyError> {
        let pipes = PipeRegistry::builtin(config);
        let wrappers = WrapperRegistry::with_config(&config.wrappers);
        Assembler::new(config, &DeclaredPorts, &pipes, &wrappers).assemble(metas)
    }

    fn users() -> HandlerMeta {
        HandlerMeta::port(
            "App\\Port\\User",
            "app",
            DocMeta::new().with("ROUTE", "users").with("VERB", "GET"),
        )
        .property("id", DocMeta::new().with("TITLE", "User id").with("TYPE", "pint"))
        .property("name", DocMeta::new().with("TITLE", "Name").with("TYPE", "string"))
        .method(MethodMeta::new("list", DocMeta::new().with("TITLE", "List users")))
        .method(
            MethodMeta::new(
                "show",
                DocMeta::new()
                    .with("TITLE", "Show user")
                    .with("ROUTE", "{id}")
                    .with("ARGUMENT", "id"),
            )
            .param("id"),
        )
        .method(
            MethodMeta::new(
                "rename",
                DocMeta::new()
                    .with("TITLE", "Rename user")
                    .with("ROUTE", "{id}/name")
                    .with("VERB", "PATCH")
                    .with("ARGUMENT", "name")
                    .with_extra("ARGUMENT", json!({"name": {"NEED:0": "", "_note": "ignored"}})),
            )
            .param("id"),
        )
        .method(MethodMeta::new("_helper", DocMeta::new().with("ROUTE", "helper")))
    }

    #[test]
    fn test_assembles_routes_and_ports() {
        let config = KernelConfig::default();
        let assembly = assemble(&config, &[users()]).unwrap();
        let registry = &assembly.registry;

        assert_eq!(registry.route_count(), 3);
        assert!(registry.route("users", Verb::Get).is_some());
        assert!(registry.route("users/?", Verb::Get).is_some());
        assert!(registry.route("users/?/name", Verb::Patch).is_some());
        assert!(registry.route("users/helper", Verb::Get).is_none());
        assert!(registry.properties("App\\Port\\User").is_some());

        let show = registry.port("App\\Port\\User", "show").unwrap();
        assert_eq!(show.route, "users/{id}");
        assert_eq!(show.arguments[0].requirement, Requirement::Always);

        let rename = registry.port("App\\Port\\User", "rename").unwrap();
        assert_eq!(rename.verbs, vec![Verb::Patch]);
        assert_eq!(rename.arguments[0].requirement, Requirement::Never);
    }

    #[test]
    fn test_duplicated_route() {
        let config = KernelConfig::default();
        let meta = users().method(MethodMeta::new(
            "find",
            DocMeta::new().with("TITLE", "Find").with("ROUTE", "{uid}"),
        ));
        let err = assemble(&config, &[meta]).unwrap_err();
        assert_eq!(err.code(), "DUPLICATED_ROUTE");
        assert!(err.to_string().contains("App\\Port\\User@show"));
    }

    #[test]
    fn test_structural_errors() {
        let config = KernelConfig::default();
        let base = || HandlerMeta::port("App\\Port\\Misc", "app", DocMeta::new().with("VERB", "GET"));

        let untitled = base().method(MethodMeta::new("a", DocMeta::new().with("ROUTE", "a")));
        assert_eq!(assemble(&config, &[untitled]).unwrap_err().code(), "PORT_WITHOUT_TITLE");

        let undefined = base().method(MethodMeta::new(
            "a",
            DocMeta::new().with("ROUTE", "a").with("TITLE", "A").with("ARGUMENT", "ghost"),
        ));
        assert_eq!(assemble(&config, &[undefined]).unwrap_err().code(), "ARGUMENT_UNDEFINED");

        let untyped = base()
            .property("x", DocMeta::new().with("TITLE", "X"))
            .method(MethodMeta::new(
                "a",
                DocMeta::new().with("ROUTE", "a").with("TITLE", "A").with("ARGUMENT", "x"),
            ));
        assert_eq!(assemble(&config, &[untyped]).unwrap_err().code(), "ARGUMENT_TYPE_MISSING");

        let twice = base()
            .property("x", DocMeta::new().with("TITLE", "X").with("TYPE", "int"))
            .method(MethodMeta::new(
                "a",
                DocMeta::new()
                    .with("ROUTE", "a")
                    .with("TITLE", "A")
                    .with("ARGUMENT", "x")
                    .with_extra("ARGUMENT", json!({"x": {"NEED": "", "NEEDIFHAS:y": ""}})),
            ));
        assert_eq!(assemble(&config, &[twice]).unwrap_err().code(), "MULTIPLE_REQUIREMENT_RULES");

        let nameless = HandlerMeta::port("", "app", DocMeta::new());
        assert_eq!(assemble(&config, &[nameless]).unwrap_err().code(), "CLASS_WITHOUT_NAMESPACE");

        let autonomy = HandlerMeta::port("App\\Port\\Job", "app", DocMeta::new().with("AUTONOMY", true));
        assert_eq!(assemble(&config, &[autonomy]).unwrap_err().code(), "AUTONOMY_HANDLER_MISSING");
    }

    #[test]
    fn test_autonomy_uses_execute_only() {
        let config = KernelConfig::default();
        let meta = HandlerMeta::port(
            "App\\Port\\Job",
            "app",
            DocMeta::new().with("AUTONOMY", true).with("ROUTE", "jobs").with("VERB", "POST"),
        )
        .method(MethodMeta::new("execute", DocMeta::new().with("TITLE", "Run job")))
        .method(MethodMeta::new("other", DocMeta::new().with("TITLE", "Other").with("ROUTE", "x")));
        let assembly = assemble(&config, &[meta]).unwrap();
        assert_eq!(assembly.registry.port_count(), 1);
        assert!(assembly.registry.port("App\\Port\\Job", "execute").is_some());
    }

    #[test]
    fn test_invalid_handler() {
        struct Nothing;
        impl PortCatalog for Nothing {
            fn contains(&self, _class: &str) -> bool {
                false
            }
        }
        let config = KernelConfig::default();
        let pipes = PipeRegistry::builtin(&config);
        let wrappers = WrapperRegistry::builtin();
        let err = Assembler::new(&config, &Nothing, &pipes, &wrappers)
            .assemble(&[users()])
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_HANDLER");
    }

    #[test]
    fn test_wrapin_reference() {
        let config = KernelConfig::default();
        let form = HandlerMeta::wrapin("App\\Form\\Signup", DocMeta::new().with("TITLE", "Signup"))
            .property("email", DocMeta::new().with("TITLE", "Email").with("TYPE", "string"));
        let port = HandlerMeta::port("App\\Port\\Account", "app", DocMeta::new().with("VERB", "POST"))
            .method(MethodMeta::new(
                "signup",
                DocMeta::new()
                    .with("TITLE", "Sign up")
                    .with("ROUTE", "signup")
                    .with("WRAPIN", "App\\Form\\Signup"),
            ));
        let assembly = assemble(&config, &[port, form]).unwrap();
        assert_eq!(assembly.wrapins.len(), 1);
        let signup = assembly.registry.port("App\\Port\\Account", "signup").unwrap();
        assert_eq!(signup.settings.wrapin.as_deref(), Some("App\\Form\\Signup"));
        assert_eq!(PathTemplate::parse(&signup.route).key(), "signup");
    }
}
