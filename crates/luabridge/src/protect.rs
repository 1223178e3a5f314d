//! Protected invocation
//!
//! [`State::call`] is the single place where Lua code, or a trampoline, gets
//! executed. It always goes through `lua_pcall`, so a Lua error unwinds the
//! interpreter up to the protected boundary and never jumps across host
//! frames. The status and error value are then turned into a [`Result`]:
//! - success leaves the results on the stack
//! - a memory error becomes [`Error::Memory`]
//! - a host failure carried through Lua is handed back as it was raised
//! - any other error value is pinned in a [`LuaError`]

use mlua_sys as ffi;
use std::os::raw::c_int;
use std::panic;
use tracing::debug;

use crate::error::{Error, LuaPanic, Result};
use crate::exception::{LuaError, UNKNOWN_ERROR_MESSAGE};
use crate::failure::{Resumed, WrappedFailure};
use crate::raw::{self, HOST_EXCEPTION_METATABLE};
use crate::state::State;
use crate::userdata;

/// How a protected call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    OutOfMemory,
    Runtime,
    ErrorHandler,
}

impl Outcome {
    pub(crate) fn from_status(status: c_int) -> Self {
        match status {
            ffi::LUA_OK => Outcome::Success,
            ffi::LUA_ERRMEM => Outcome::OutOfMemory,
            ffi::LUA_ERRERR => Outcome::ErrorHandler,
            _ => Outcome::Runtime,
        }
    }
}

impl State {
    /// Call the function below `nargs` arguments on top of the stack.
    ///
    /// `nresults` may be [`MULTRET`](crate::MULTRET). `errfunc` is the stack
    /// index of a message handler, or 0 for none. On failure the function and
    /// its arguments are gone from the stack and the error value has been
    /// consumed.
    ///
    /// A panic raised by a host callable somewhere below this call resumes
    /// from here with its original payload.
    pub fn call(&self, nargs: c_int, nresults: c_int, errfunc: c_int) -> Result<()> {
        let l = self.as_ptr();
        let status = unsafe { ffi::lua_pcall(l, nargs, nresults, errfunc) };

        let outcome = Outcome::from_status(status);
        match outcome {
            Outcome::Success => return Ok(()),
            Outcome::OutOfMemory => {
                unsafe { ffi::lua_pop(l, 1) };
                debug!(status, "protected call ran out of memory");
                return Err(Error::Memory);
            }
            Outcome::Runtime | Outcome::ErrorHandler => {}
        }

        if let Some(resumed) = unsafe { self.take_host_failure()? } {
            match resumed {
                Resumed::Error(err) => {
                    debug!(status, error = %err, "protected call failed in host code");
                    return Err(err);
                }
                Resumed::Panic(payload) => {
                    debug!(status, "resuming host panic");
                    panic::resume_unwind(payload);
                }
            }
        }

        let err = unsafe { LuaError::from_top(self)? };
        debug!(status, message = err.message(), "protected call failed");
        match outcome {
            Outcome::ErrorHandler => Err(Error::ErrorHandler(err)),
            _ => Err(Error::Runtime(err)),
        }
    }

    /// If the error value on top is a host failure, pops it and takes the
    /// failure out.
    unsafe fn take_host_failure(&self) -> Result<Option<Resumed>> {
        let l = self.as_ptr();
        if !userdata::has_tag(l, -1, HOST_EXCEPTION_METATABLE)? {
            return Ok(None);
        }

        let failure = ffi::lua_touserdata(l, -1) as *mut WrappedFailure;
        if failure.is_null() {
            return Ok(None);
        }
        // the copy outlives the userdata, which is left to the collector
        let resumed = (*failure).resume();
        ffi::lua_pop(l, 1);
        Ok(Some(resumed))
    }
}

/// `lua_atpanic` handler: turns an error raised outside any protected call
/// into a Rust panic instead of letting Lua abort the process.
pub(crate) unsafe extern "C-unwind" fn panic_hook(l: *mut ffi::lua_State) -> c_int {
    let message = if raw::checkstack(l, 1).is_ok() {
        raw::to_text(l, -1)
    } else {
        None
    };
    panic::panic_any(LuaPanic {
        message: message.unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string()),
    })
}
