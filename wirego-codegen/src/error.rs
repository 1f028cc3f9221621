//! Error types for constructor synthesis and emission.

use thiserror::Error;
use wirego_schema::Location;

/// Error type for code generation operations.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// Source parsing error.
    #[error("parse error: {0}")]
    Parse(#[from] wirego_schema::ParseError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A capability-typed field has no active binding.
    #[error("no binding for capability '{capability}' required by field '{field}' of '{record}'")]
    MissingBinding {
        /// Capability type.
        capability: String,
        /// Record declaring the field.
        record: String,
        /// Field name.
        field: String,
    },

    /// The bound implementation lacks the capability's first method.
    #[error("'{implementation}' does not implement method '{method}' of '{capability}'")]
    MissingMethod {
        /// Implementation type.
        implementation: String,
        /// Capability type.
        capability: String,
        /// Required method.
        method: String,
    },

    /// The memoized constructor of a singleton takes parameters.
    #[error("singleton constructor '{constructor}' for '{type_name}' must take no parameters")]
    InvalidSingleton {
        /// Singleton type.
        type_name: String,
        /// Constructor name.
        constructor: String,
    },

    /// The memoized constructor of a singleton is not declared.
    #[error("constructor '{constructor}' for singleton '{type_name}' not found")]
    MissingConstructor {
        /// Singleton type.
        type_name: String,
        /// Constructor name.
        constructor: String,
    },

    /// Resolution reached a type that is already being constructed.
    #[error("dependency cycle: {}", path.join(" -> "))]
    CycleDetected {
        /// Types on the resolution stack, ending with the repeated one.
        path: Vec<String>,
    },

    /// A directive names a type with no usable declaration.
    #[error("unknown type '{type_name}'")]
    UnknownType {
        /// Type name.
        type_name: String,
    },

    /// A directive argument had an unrecognized shape.
    #[error("incomplete {directive} directive: {message}")]
    IncompleteDirective {
        /// Directive kind.
        directive: String,
        /// What is missing.
        message: String,
    },

    /// Two directives register the same type or capability.
    #[error("duplicate {directive} for '{type_name}'")]
    DuplicateBinding {
        /// Directive kind.
        directive: String,
        /// Type or capability name.
        type_name: String,
    },

    /// The package already declares the constructor that would be generated.
    #[error("package '{package}' already declares '{function}'")]
    DuplicateConstructor {
        /// Package name.
        package: String,
        /// Function name.
        function: String,
    },

    /// A keyed binding cannot fill a record field.
    #[error("keyed binding for '{capability}' cannot fill field '{field}' of '{record}'")]
    KeyedBindingField {
        /// Capability type.
        capability: String,
        /// Record declaring the field.
        record: String,
        /// Field name.
        field: String,
    },

    /// A call to the directive library uses an unknown kind.
    #[error("unknown directive '{kind}'")]
    UnknownDirective {
        /// Kind name as written.
        kind: String,
    },

    /// Error attributed to a directive.
    #[error("{location}: {source}")]
    Directive {
        /// Directive position.
        location: Location,
        /// Underlying error.
        #[source]
        source: Box<CodegenError>,
    },

    /// Every error collected during one run.
    #[error("{} generation error(s):\n{}", errors.len(), render_list(errors))]
    Diagnostics {
        /// Collected errors, in directive order.
        errors: Vec<CodegenError>,
    },
}

fn render_list(errors: &[CodegenError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl CodegenError {
    /// Creates a missing binding error.
    pub fn missing_binding(
        capability: impl Into<String>,
        record: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self::MissingBinding {
            capability: capability.into(),
            record: record.into(),
            field: field.into(),
        }
    }

    /// Creates an unknown type error.
    pub fn unknown_type(type_name: impl Into<String>) -> Self {
        Self::UnknownType {
            type_name: type_name.into(),
        }
    }

    /// Creates an incomplete directive error.
    pub fn incomplete(directive: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IncompleteDirective {
            directive: directive.into(),
            message: message.into(),
        }
    }

    /// Creates a duplicate binding error.
    pub fn duplicate(directive: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::DuplicateBinding {
            directive: directive.into(),
            type_name: type_name.into(),
        }
    }

    /// Attributes the error to a directive.
    #[must_use]
    pub fn at(self, location: &Location) -> Self {
        Self::Directive {
            location: location.clone(),
            source: Box::new(self),
        }
    }

    /// Returns the error without its directive attribution.
    #[must_use]
    pub fn root(&self) -> &CodegenError {
        match self {
            Self::Directive { source, .. } => source.root(),
            other => other,
        }
    }
}
