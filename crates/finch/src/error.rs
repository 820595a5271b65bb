//! Error types for the `Finch` runtime.
//!
//! [`Error`] is the Rust-side error channel: every fallible runtime
//! operation returns [`Result`]. It is distinct from the runtime's own `Err`
//! class ([`ErrObject`]), which is an object like any other. The two meet
//! at [`trap`](crate::runtime::trap::trap), which turns an `Error` into an
//! `ErrObject`, and at [`Error::Raised`], which carries an `ErrObject`
//! through `?`.

use crate::runtime::ErrObject;
use crate::runtime::class::ROOT_CLASS_NAME;
use std::fmt;

/// Errors that can occur in the `Finch` runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An operation declared abstract on the root class was invoked on an
    /// instance whose class never overrode it.
    AbstractMethod {
        /// Name of the operation, e.g. `"clone"`.
        method: &'static str,
        /// Name of the receiver's class.
        class: String,
    },

    /// A class with this name is already registered.
    ClassAlreadyExists {
        /// The duplicate name.
        name: String,
    },

    /// An object was not an instance of the class the caller required.
    ClassMismatch {
        /// Required class name.
        expected: String,
        /// Actual class name of the object.
        found: String,
    },

    /// Core classes (`Obj`, `Err`, `String`) cannot have their methods
    /// replaced.
    SealedClass {
        /// Name of the core class.
        name: String,
    },

    /// Bytes handed to a string constructor were not valid UTF-8.
    InvalidUtf8,

    /// A runtime error object travelling through a Rust `Result`.
    Raised(ErrObject),
}

impl Error {
    /// Builds the fault reported by an un-overridden abstract operation.
    pub(crate) fn abstract_method(method: &'static str, class: &str) -> Self {
        Error::AbstractMethod {
            method,
            class: class.to_string(),
        }
    }

    /// Builds a class mismatch between a required and an actual class name.
    pub(crate) fn class_mismatch(expected: &str, found: &str) -> Self {
        Error::ClassMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AbstractMethod { method, class } => {
                write!(
                    f,
                    "{method}() is abstract (declared by {ROOT_CLASS_NAME}, invoked on {class})"
                )
            }
            Error::ClassAlreadyExists { name } => {
                write!(f, "Class '{name}' already exists in registry")
            }
            Error::ClassMismatch { expected, found } => {
                write!(f, "Expected an instance of '{expected}', got '{found}'")
            }
            Error::SealedClass { name } => {
                write!(f, "Class '{name}' is a core class and cannot be overridden")
            }
            Error::InvalidUtf8 => write!(f, "Invalid UTF-8 in string data"),
            Error::Raised(err) => write!(f, "{}", err.message()),
        }
    }
}

impl std::error::Error for Error {}

impl From<ErrObject> for Error {
    fn from(err: ErrObject) -> Self {
        Error::Raised(err)
    }
}

/// Result type for `Finch` runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abstract_message_contains_marker() {
        let err = Error::abstract_method("clone", "Widget");
        let text = err.to_string();

        assert!(text.contains("is abstract"));
        assert!(text.contains("bstract"));
        assert!(text.contains("clone"));
        assert!(text.contains(ROOT_CLASS_NAME));
        assert!(text.contains("Widget"));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::ClassAlreadyExists { name: "Widget".into() }.to_string(),
            "Class 'Widget' already exists in registry"
        );
        assert_eq!(
            Error::class_mismatch("String", "Obj").to_string(),
            "Expected an instance of 'String', got 'Obj'"
        );
        assert_eq!(Error::InvalidUtf8.to_string(), "Invalid UTF-8 in string data");
    }

    #[test]
    fn test_raised_displays_message() {
        let err = Error::from(ErrObject::new("disk on fire"));
        assert_eq!(err.to_string(), "disk on fire");
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(
            Error::abstract_method("mimic", "A"),
            Error::abstract_method("mimic", "A")
        );
        assert_ne!(
            Error::abstract_method("mimic", "A"),
            Error::abstract_method("mimic", "B")
        );
    }
}
