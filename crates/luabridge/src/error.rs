//! Error types for the Lua bridge
//!
//! Every fallible operation returns [`Result`]. Failures raised by Lua carry a
//! [`LuaError`] that keeps the original Lua value reachable; failures raised by
//! host code keep their concrete type behind [`Error::External`].

use std::error::Error as StdError;
use std::sync::Arc;

use crate::exception::LuaError;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Bridge error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Memory allocation failed, or the Lua stack cannot grow any further
    #[error("Memory allocation failed")]
    Memory,

    /// A chunk failed to compile
    #[error("Syntax error: {0}")]
    Syntax(LuaError),

    /// A chunk file could not be opened or read
    #[error("Cannot read chunk: {0}")]
    File(LuaError),

    /// Lua raised an error inside a protected call
    #[error("{0}")]
    Runtime(LuaError),

    /// The message handler of a protected call failed itself
    #[error("Error in error handler: {0}")]
    ErrorHandler(LuaError),

    /// A Lua error was pushed into a state other than the one that raised it
    #[error("Cannot transfer exceptions between different lua states")]
    Transfer,

    /// The value cannot be converted to a string
    #[error("Value is not a string")]
    NotString,

    /// A panic carried through Lua was resumed once already
    #[error("Panic was already resumed")]
    PreviouslyResumedPanic,

    /// Error raised by host code
    #[error("{0}")]
    External(Arc<dyn StdError + Send + Sync>),
}

impl Error {
    /// Wrap an arbitrary host error
    pub fn external<E: Into<Box<dyn StdError + Send + Sync>>>(err: E) -> Self {
        Error::External(Arc::from(err.into()))
    }

    /// Borrow the host error if it is of type `T`
    pub fn downcast_ref<T: StdError + 'static>(&self) -> Option<&T> {
        match self {
            Error::External(err) => err.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// The Lua error value behind this error, if Lua raised it
    pub fn lua_error(&self) -> Option<&LuaError> {
        match self {
            Error::Syntax(err) | Error::File(err) | Error::Runtime(err) | Error::ErrorHandler(err) => {
                Some(err)
            }
            _ => None,
        }
    }
}

/// Panic payload raised when Lua reports an error outside of any protected call
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unprotected error in lua: {message}")]
pub struct LuaPanic {
    /// Text of the Lua error value
    pub message: String,
}
