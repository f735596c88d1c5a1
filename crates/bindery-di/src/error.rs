//! Container error types

use thiserror::Error;

/// Result type for container operations
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Broad failure family an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid bind-time state; raised before anything is resolved
    Configuration,
    /// A specific dependency could not be satisfied during resolution
    UnresolvedDependency,
    /// Call-time arguments given for an already constructed shared instance
    UnusableArguments,
    /// Programmer error (misuse of the API)
    Logic,
}

/// Errors raised by the container
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Unresolved dependency ${parameter} of {service}: {reason}")]
    UnresolvedDependency {
        service: String,
        parameter: String,
        reason: String,
    },

    #[error("Service is not instantiable: {service}")]
    NotInstantiable { service: String },

    #[error("Type mismatch for service {service}: expected {expected}")]
    TypeMismatch {
        service: String,
        expected: &'static str,
    },

    #[error("Arguments cannot be applied to {service}: it resolves to an existing shared instance")]
    UnusableArguments { service: String },

    #[error("Circular dependency detected: {chain}")]
    CircularDependency { chain: String },

    #[error("Logic error: {message}")]
    Logic { message: String },

    #[error("Factory error for service {service}: {message}")]
    Factory { service: String, message: String },
}

impl ContainerError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn unresolved<S, P, R>(service: S, parameter: P, reason: R) -> Self
    where
        S: Into<String>,
        P: Into<String>,
        R: Into<String>,
    {
        Self::UnresolvedDependency {
            service: service.into(),
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    pub fn not_instantiable<S: Into<String>>(service: S) -> Self {
        Self::NotInstantiable {
            service: service.into(),
        }
    }

    pub fn type_mismatch<S: Into<String>>(service: S, expected: &'static str) -> Self {
        Self::TypeMismatch {
            service: service.into(),
            expected,
        }
    }

    pub fn unusable_arguments<S: Into<String>>(service: S) -> Self {
        Self::UnusableArguments {
            service: service.into(),
        }
    }

    pub fn logic<S: Into<String>>(message: S) -> Self {
        Self::Logic {
            message: message.into(),
        }
    }

    /// Create a factory error, typically from a constructor callback
    pub fn factory<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::Factory {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::UnresolvedDependency { .. }
            | Self::NotInstantiable { .. }
            | Self::TypeMismatch { .. }
            | Self::Factory { .. } => ErrorCategory::UnresolvedDependency,
            Self::UnusableArguments { .. } => ErrorCategory::UnusableArguments,
            Self::CircularDependency { .. } | Self::Logic { .. } => ErrorCategory::Logic,
        }
    }
}
