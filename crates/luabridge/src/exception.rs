//! Lua errors travelling through host code
//!
//! A [`LuaError`] keeps the raised Lua value alive by storing it in a private
//! registry table. This lets the value be inspected, or raised again, after the
//! protected call that produced it has returned:
//! - clones share one registry reference
//! - the reference is released when the last clone drops
//! - nothing is released once the owning state has been closed

use mlua_sys as ffi;
use std::fmt;
use std::os::raw::c_int;
use std::rc::Rc;
use tracing::trace;

use crate::error::{Error, Result};
use crate::raw::{self, ERROR_NAMESPACE};
use crate::state::State;
use crate::trampoline;
use crate::validity::ValidityFlag;

/// Message used when the Lua error value has no text representation
pub(crate) const UNKNOWN_ERROR_MESSAGE: &str = "unknown lua exception";

/// A Lua error value held by host code
#[derive(Clone)]
pub struct LuaError {
    message: Rc<str>,
    pinned: Rc<PinnedValue>,
}

// Registry slot holding the error value
struct PinnedValue {
    main: *mut ffi::lua_State,
    valid: ValidityFlag,
    key: c_int,
}

impl Drop for PinnedValue {
    fn drop(&mut self) {
        if !self.valid.is_valid() {
            trace!(key = self.key, "lua state already closed, dropping error reference");
            return;
        }

        unsafe {
            // leaking the slot is the only option without stack space
            if ffi::lua_checkstack(self.main, 1) == 0 {
                return;
            }
            raw::get_raw_field(self.main, ffi::LUA_REGISTRYINDEX, ERROR_NAMESPACE);
            if ffi::lua_type(self.main, -1) == ffi::LUA_TTABLE {
                ffi::luaL_unref(self.main, -1, self.key);
            }
            ffi::lua_pop(self.main, 1);
        }
        trace!(key = self.key, "released error reference");
    }
}

impl LuaError {
    /// Takes the value on top of the current stack of `state` and pins it.
    ///
    /// The value is always popped. Pinning runs under `lua_pcall`; if the
    /// registry cannot grow, the error keeps its message only.
    pub(crate) unsafe fn from_top(state: &State) -> Result<Self> {
        let l = state.as_ptr();
        let message = raw::to_text(l, -1).unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string());

        if let Err(err) = raw::checkstack(l, 1) {
            ffi::lua_pop(l, 1);
            return Err(err);
        }
        ffi::lua_pushcfunction(l, trampoline::pin_value);
        ffi::lua_insert(l, -2);
        let key = if ffi::lua_pcall(l, 1, 1, 0) == ffi::LUA_OK {
            ffi::lua_tointeger(l, -1) as c_int
        } else {
            trace!("no memory left to pin lua error value");
            ffi::LUA_NOREF
        };
        ffi::lua_pop(l, 1);

        Ok(LuaError {
            message: Rc::from(message),
            pinned: Rc::new(PinnedValue {
                main: state.main_ptr(),
                valid: state.validity(),
                key,
            }),
        })
    }

    /// Text of the error value, or a fixed description if it has none
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the state that raised this error is still open
    pub fn is_state_alive(&self) -> bool {
        self.pinned.valid.is_valid()
    }

    /// Push the original Lua error value onto the stack of `state`.
    ///
    /// Fails with [`Error::Transfer`] if `state` is not the state that raised
    /// the error.
    pub fn push(&self, state: &State) -> Result<()> {
        if !self.pinned.valid.same_state(state.validity_flag()) || !self.is_state_alive() {
            return Err(Error::Transfer);
        }

        let l = state.as_ptr();
        unsafe {
            raw::checkstack(l, 2)?;
            if self.pinned.key == ffi::LUA_NOREF {
                ffi::lua_pushnil(l);
                return Ok(());
            }
            raw::get_raw_field(l, ffi::LUA_REGISTRYINDEX, ERROR_NAMESPACE);
            ffi::lua_rawgeti(l, -1, self.pinned.key as ffi::lua_Integer);
            ffi::lua_replace(l, -2);
        }
        Ok(())
    }
}

impl fmt::Display for LuaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for LuaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuaError")
            .field("message", &self.message)
            .field("key", &self.pinned.key)
            .finish()
    }
}
