//! Luabridge - Protected-call bridge between Rust and an embedded Lua VM
//!
//! Lua reports errors with a non-local jump. This crate keeps that jump from
//! ever crossing Rust frames:
//! - every Lua operation that may raise runs inside `lua_pcall`
//! - Lua errors come back as [`Error`] values holding a [`LuaError`]
//! - errors and panics raised by host functions travel through Lua and are
//!   handed back to the calling Rust code unchanged
//!
//! # Example
//!
//! ```ignore
//! use luabridge::{Error, State, StateOptions};
//!
//! let state = State::new(StateOptions::default())?;
//! state.register("add", |state| {
//!     let a = state.to_integer(1).unwrap_or_default();
//!     let b = state.to_integer(2).unwrap_or_default();
//!     state.push_integer(a + b)?;
//!     Ok(1)
//! })?;
//!
//! match state.do_string("return add(1, 2)") {
//!     Ok(n) => println!("{} results", n),
//!     Err(Error::Runtime(err)) => eprintln!("lua error: {}", err),
//!     Err(err) => eprintln!("{}", err),
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod exception;
pub mod options;
pub mod state;
pub mod validity;

mod failure;
mod function;
mod protect;
mod raw;
mod trampoline;
mod userdata;

pub use error::{Error, LuaPanic, Result};
pub use exception::LuaError;
pub use function::Callable;
pub use options::StateOptions;
pub use state::{GcCommand, LuaType, State, MULTRET, REGISTRYINDEX};
pub use validity::ValidityFlag;
