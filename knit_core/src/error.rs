//! Error types.

use std::error::Error as StdError;
use std::sync::Arc;

use crate::token::TypeKey;

/// A boxed error raised by user code, e.g. a fallible constructor.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// [`Error`] is an error that can be raised by functions and methods from this library.
///
/// All variants abort the resolution pass they occur in. Optional resolution only
/// ever turns [`Error::MissingBinding`] of the requested token into an absent value.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A required token has no provider.
    #[error("{token} is not provided{}", trace_suffix(.trace))]
    MissingBinding {
        /// Description of the unbound token.
        token: String,
        /// Rendered trace at the time of the lookup.
        trace: String,
    },

    /// A type was requested while already under construction in the same pass.
    #[error("circular dependency detected: {chain}")]
    CircularDependency {
        /// The chain in push order, ending with the repeated type.
        chain: String,
    },

    /// A binding cannot be used to build a value.
    #[error("invalid binding for `{type_name}`: {reason}")]
    InvalidBinding {
        type_name: &'static str,
        reason: String,
    },

    /// Building or populating an instance failed.
    #[error("failed to construct `{type_name}`: {source}")]
    Construction {
        type_name: &'static str,
        source: Arc<dyn StdError + Send + Sync + 'static>,
    },
}

fn trace_suffix(trace: &str) -> String {
    if trace.is_empty() {
        String::new()
    } else {
        format!(" (while resolving {trace})")
    }
}

impl Error {
    pub fn missing_binding(token: impl ToString, trace: impl ToString) -> Self {
        Self::MissingBinding {
            token: token.to_string(),
            trace: trace.to_string(),
        }
    }

    pub fn invalid_binding<T>(reason: impl Into<String>) -> Self
    where
        T: ?Sized + 'static,
    {
        Self::invalid_binding_of(TypeKey::of::<T>(), reason)
    }

    pub fn invalid_binding_of(key: TypeKey, reason: impl Into<String>) -> Self {
        Self::InvalidBinding {
            type_name: key.name(),
            reason: reason.into(),
        }
    }

    pub fn construction<T>(err: impl Into<BoxError>) -> Self
    where
        T: ?Sized + 'static,
    {
        Self::construction_of(TypeKey::of::<T>(), err)
    }

    pub fn construction_of(key: TypeKey, err: impl Into<BoxError>) -> Self {
        Self::Construction {
            type_name: key.name(),
            source: Arc::from(err.into()),
        }
    }

    pub const fn is_missing_binding(&self) -> bool {
        matches!(self, Self::MissingBinding { .. })
    }

    pub const fn is_circular_dependency(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }

    pub const fn is_invalid_binding(&self) -> bool {
        matches!(self, Self::InvalidBinding { .. })
    }

    pub const fn is_construction(&self) -> bool {
        matches!(self, Self::Construction { .. })
    }

    /// Returns the rendered chain if this is a [`Error::CircularDependency`].
    pub fn cycle(&self) -> Option<&str> {
        match self {
            Self::CircularDependency { chain } => Some(chain),
            _ => None,
        }
    }
}

/// [`Result`] is an alias to [`core::result::Result`] with [`Error`] as the
/// default error type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Database;

    #[test]
    fn test_missing_binding_display() {
        let err = Error::missing_binding("type app::Database", "");
        assert_eq!(err.to_string(), "type app::Database is not provided");
        assert!(err.is_missing_binding());

        let err = Error::missing_binding("type app::Database", "App -> Repository");
        assert_eq!(
            err.to_string(),
            "type app::Database is not provided (while resolving App -> Repository)"
        );
    }

    #[test]
    fn test_construction_source() {
        let err = Error::construction::<Database>("connection refused");
        assert!(err.is_construction());
        assert_eq!(
            StdError::source(&err).map(ToString::to_string).as_deref(),
            Some("connection refused")
        );
        assert!(err.to_string().ends_with("Database`: connection refused"));
    }

    #[test]
    fn test_cycle() {
        let err = Error::CircularDependency {
            chain: "A -> B -> A".to_string(),
        };
        assert!(err.is_circular_dependency());
        assert_eq!(err.cycle(), Some("A -> B -> A"));
        assert_eq!(err.to_string(), "circular dependency detected: A -> B -> A");
        assert!(Error::invalid_binding::<Database>("ambiguous").cycle().is_none());
    }
}
