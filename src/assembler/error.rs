//! Assembly errors. All of them are configuration bugs and abort start-up.

use std::fmt;

use serde_json::Value;

use crate::http::verb::Verb;
use crate::validate::{PropertyError, WrapInError};

/// Where a rejected setting value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Method,
    Class,
    DomainLocal,
    DomainGlobal,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Method => "method",
            Level::Class => "class",
            Level::DomainLocal => "domain-local",
            Level::DomainGlobal => "domain-global",
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssemblyError {
    #[error("class {class} is not a port handler")]
    InvalidHandler { class: String },

    #[error("handler class has no namespace")]
    ClassWithoutNamespace,

    #[error("autonomy class {class} has no {handler} method")]
    AutonomyHandlerMissing { class: String, handler: String },

    #[error("route of {class}@{method} has no verb")]
    RouteWithoutVerb { class: String, method: String },

    #[error("{class}@{method} declares unknown verb {verb:?}")]
    InvalidHttpVerb {
        class: String,
        method: String,
        verb: String,
    },

    #[error("route {verb} {route} of {target} is already bound to {conflict}")]
    DuplicatedRoute {
        route: String,
        verb: Verb,
        target: String,
        conflict: String,
    },

    #[error("port {class}@{method} has no title")]
    PortWithoutTitle { class: String, method: String },

    #[error("{class}@{method}: {level} value {value} of {annotation} is not a valid {expected}")]
    InvalidAnnotationType {
        class: String,
        method: String,
        annotation: String,
        level: Level,
        expected: &'static str,
        value: Value,
    },

    #[error("{class}@{method} declares undefined argument {argument}")]
    ArgumentUndefined {
        class: String,
        method: String,
        argument: String,
    },

    #[error("{class}@{method}: {source}")]
    Argument {
        class: String,
        method: String,
        #[source]
        source: PropertyError,
    },

    #[error("{class}@{method}: {annotation} pipe {pipe} does not exist")]
    PipeNotExists {
        class: String,
        method: String,
        annotation: String,
        pipe: String,
    },

    #[error("{class}@{method}: {annotation} wrapper {wrapper} does not exist")]
    WrapperNotExists {
        class: String,
        method: String,
        annotation: String,
        wrapper: String,
    },

    #[error("{class}@{method}: wrap-in {wrapin} does not exist")]
    WrapInNotExists {
        class: String,
        method: String,
        wrapin: String,
    },

    #[error("{class}@{method}: {annotation} alias {alias} is not a known MIME alias")]
    InvalidMimeAlias {
        class: String,
        method: String,
        annotation: String,
        alias: String,
    },

    #[error(transparent)]
    WrapIn(#[from] WrapInError),
}

impl AssemblyError {
    /// Stable error tag.
    pub fn code(&self) -> &'static str {
        match self {
            AssemblyError::InvalidHandler { .. } => "INVALID_HANDLER",
            AssemblyError::ClassWithoutNamespace => "CLASS_WITHOUT_NAMESPACE",
            AssemblyError::AutonomyHandlerMissing { .. } => "AUTONOMY_HANDLER_MISSING",
            AssemblyError::RouteWithoutVerb { .. } => "ROUTE_WITHOUT_VERB",
            AssemblyError::InvalidHttpVerb { .. } => "INVALID_HTTP_VERB",
            AssemblyError::DuplicatedRoute { .. } => "DUPLICATED_ROUTE",
            AssemblyError::PortWithoutTitle { .. } => "PORT_WITHOUT_TITLE",
            AssemblyError::InvalidAnnotationType { .. } => "INVALID_ANNOTATION_TYPE",
            AssemblyError::ArgumentUndefined { .. } => "ARGUMENT_UNDEFINED",
            AssemblyError::Argument { source, .. } => match source {
                PropertyError::TitleMissing(_) => "ARGUMENT_TITLE_MISSING",
                PropertyError::TypeMissing(_) => "ARGUMENT_TYPE_MISSING",
                PropertyError::UnsupportedType { .. } => "UNSUPPORTED_ARGUMENT_TYPE",
                PropertyError::MultipleRequirementRules(_) => "MULTIPLE_REQUIREMENT_RULES",
                PropertyError::InvalidRule { .. } => "INVALID_ARGUMENT_RULE",
            },
            AssemblyError::PipeNotExists { .. } => "PIPE_NOT_EXISTS",
            AssemblyError::WrapperNotExists { .. } => "WRAPPER_NOT_EXISTS",
            AssemblyError::WrapInNotExists { .. } => "WRAPIN_NOT_EXISTS",
            AssemblyError::InvalidMimeAlias { .. } => "INVALID_MIME_ALIAS",
            AssemblyError::WrapIn(err) => match err {
                WrapInError::WithoutNamespace => "WRAPIN_WITHOUT_NAMESPACE",
                WrapInError::TitleMissing(_) => "MISSING_WRAPIN_TITLE",
                WrapInError::Duplicated(_) => "DUPLICATE_WRAPIN",
                WrapInError::Property { source, .. } => match source {
                    PropertyError::TitleMissing(_) => "MISSING_WRAPIN_ATTR_TITLE",
                    PropertyError::TypeMissing(_) => "MISSING_WRAPIN_ATTR_TYPE",
                    PropertyError::UnsupportedType { .. } => "UNSUPPORTED_WRAPIN_ATTR_TYPE",
                    PropertyError::MultipleRequirementRules(_) => "MULTIPLE_REQUIREMENT_RULES",
                    PropertyError::InvalidRule { .. } => "INVALID_WRAPIN_ATTR_RULE",
                },
                WrapInError::Recursive { .. } => "RECURSIVE_WRAPIN",
                WrapInError::NotExists { .. } => "WRAPIN_NOT_EXISTS",
            },
        }
    }
}
