#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;

use std::fmt;

/// Result type with custom Error
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error information
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// Type of error and additional information
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub error_type: ErrorType,

    /// Where this error occurred
    pub location: String,
}

/// Possible error types
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorType {
    // ? Fetch related errors
    NotFound,
    FetchFailed {
        reason: String,
    },

    // ? Lock related errors
    LockContention {
        name: String,
    },
    LockOwnershipMismatch {
        name: String,
    },

    // ? General errors
    DatabaseError {
        operation: String,
        with: String,
    },
    InternalError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} at {}", self.error_type, self.location)
    }
}

impl std::error::Error for Error {}

#[macro_export]
macro_rules! create_error {
    ( $error: ident $( $tt:tt )? ) => {
        $crate::Error {
            error_type: $crate::ErrorType::$error $( $tt )?,
            location: format!("{}:{}:{}", file!(), line!(), column!()),
        }
    };
}

#[macro_export]
macro_rules! create_database_error {
    ( $operation: expr, $with: expr ) => {
        create_error!(DatabaseError {
            operation: $operation.to_string(),
            with: $with.to_string()
        })
    };
}

/// Convert foreign failures into workspace errors
pub trait ToStampedeError<T> {
    /// Map any failure to an opaque internal error
    fn to_internal_error(self) -> Result<T>;

    /// Map any failure to a fetch error carrying its message
    fn to_fetch_error(self) -> Result<T>;
}

impl<T, E: fmt::Display> ToStampedeError<T> for std::result::Result<T, E> {
    fn to_internal_error(self) -> Result<T> {
        self.map_err(|_| create_error!(InternalError))
    }

    fn to_fetch_error(self) -> Result<T> {
        self.map_err(|error| {
            create_error!(FetchFailed {
                reason: error.to_string()
            })
        })
    }
}
