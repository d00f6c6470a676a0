//! Error types for the virtual machine

use thiserror::Error;

use crate::gc::ObjectId;

/// Main error type for the virtual machine.
///
/// Property misses are not errors (they read as `undefined`); everything here
/// aborts the operation that raised it and unwinds to the nearest host entry
/// point (`Vm::call`, `Vm::execute_script` or an interval firing).
#[derive(Debug, Error)]
pub enum VmError {
    /// A value could not be converted to the kind an operation needs
    /// (`ToObject` on undefined/null, `ToFunction` on a non-callable).
    #[error("TypeError: {message}")]
    TypeCoercion { message: String },

    /// An accessor property was read without a getter or written without a setter.
    #[error("PropertyAccessError: '{property}' {message}")]
    PropertyAccess { property: String, message: String },

    /// An intermediate segment of a dotted path did not resolve to an object.
    #[error("UnresolvedPathError: '{segment}' in '{path}'")]
    UnresolvedPath { path: String, segment: String },

    /// A native method was called with an argument count it does not support.
    #[error("ArityError: {function} does not accept {count} argument(s)")]
    Arity { function: String, count: usize },

    #[error("UnsupportedOperation: {message}")]
    UnsupportedOperation { message: String },

    /// The context stack grew past the configured maximum depth.
    #[error("StackExhaustion: call depth exceeded {depth}")]
    StackExhaustion { depth: usize },

    /// The bytecode decoder handed over an inconsistent function definition.
    #[error("InvalidDefinition: {message}")]
    InvalidDefinition { message: String },

    /// A VM configuration document could not be parsed.
    #[error("InvalidConfig: {message}")]
    InvalidConfig { message: String },

    #[error("InvalidRegister: register {index} outside a frame of {count}")]
    InvalidRegister { index: usize, count: usize },

    /// A handle referred to an object that has been collected.
    #[error("DanglingReference: {id:?} is no longer live")]
    DanglingReference { id: ObjectId },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VmError {
    pub fn type_error(message: impl Into<String>) -> Self {
        VmError::TypeCoercion {
            message: message.into(),
        }
    }

    pub fn property_access(property: impl Into<String>, message: impl Into<String>) -> Self {
        VmError::PropertyAccess {
            property: property.into(),
            message: message.into(),
        }
    }

    pub fn unresolved_path(path: impl Into<String>, segment: impl Into<String>) -> Self {
        VmError::UnresolvedPath {
            path: path.into(),
            segment: segment.into(),
        }
    }

    pub fn arity(function: impl Into<String>, count: usize) -> Self {
        VmError::Arity {
            function: function.into(),
            count,
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        VmError::UnsupportedOperation {
            message: message.into(),
        }
    }

    pub fn invalid_definition(message: impl Into<String>) -> Self {
        VmError::InvalidDefinition {
            message: message.into(),
        }
    }

    /// Create an internal error for states that correct callers never produce
    pub fn internal(message: impl Into<String>) -> Self {
        VmError::Internal(message.into())
    }

    /// Short name of the error kind, as exposed to scripts and logs
    pub fn kind(&self) -> &'static str {
        match self {
            VmError::TypeCoercion { .. } => "TypeError",
            VmError::PropertyAccess { .. } => "PropertyAccessError",
            VmError::UnresolvedPath { .. } => "UnresolvedPathError",
            VmError::Arity { .. } => "ArityError",
            VmError::UnsupportedOperation { .. } => "UnsupportedOperation",
            VmError::StackExhaustion { .. } => "StackExhaustion",
            VmError::InvalidDefinition { .. } => "InvalidDefinition",
            VmError::InvalidConfig { .. } => "InvalidConfig",
            VmError::InvalidRegister { .. } => "InvalidRegister",
            VmError::DanglingReference { .. } => "DanglingReference",
            VmError::Internal(_) => "InternalError",
        }
    }
}
