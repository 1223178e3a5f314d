//! Raw stack primitives
//!
//! Small helpers over the Lua C API that never raise a Lua error on their own:
//! - absolute index conversion
//! - stack growth checks (reported as [`Error::Memory`])
//! - field access on tables without invoking metamethods
//! - text extraction that does not modify the inspected value

use mlua_sys as ffi;
use std::ffi::CStr;
use std::os::raw::c_int;
use std::slice;

use crate::error::{Error, Result};

// ============================================================================
// Registry Keys
// ============================================================================

/// Metatable of host failures travelling through Lua code
pub(crate) const HOST_EXCEPTION_METATABLE: &CStr = c"luabridge::host_exception_metatable";

/// Metatable of host callables registered as Lua functions
pub(crate) const HOST_FUNCTION_METATABLE: &CStr = c"luabridge::host_function_metatable";

/// Table pinning Lua error values while they travel through host code
pub(crate) const ERROR_NAMESPACE: &CStr = c"luabridge::lua_exception_namespace";

/// Light userdata pointing back at the owning `State`
pub(crate) const THIS_STATE: &CStr = c"luabridge::this_state";

// ============================================================================
// Stack Helpers
// ============================================================================

/// Converts a relative stack index into an absolute one.
///
/// Pseudo-indices and indices that do not refer to a live slot are returned
/// unchanged.
pub(crate) unsafe fn absindex(l: *mut ffi::lua_State, index: c_int) -> c_int {
    let top = ffi::lua_gettop(l);
    if index < 0 && -index <= top {
        top + 1 + index
    } else {
        index
    }
}

/// Ensures room for `extra` more values on the stack.
pub(crate) unsafe fn checkstack(l: *mut ffi::lua_State, extra: c_int) -> Result<()> {
    if ffi::lua_checkstack(l, extra) == 0 {
        Err(Error::Memory)
    } else {
        Ok(())
    }
}

/// Pushes `t[key]` where `t` is at `index`, bypassing metamethods.
///
/// The caller must have reserved one stack slot.
pub(crate) unsafe fn get_raw_field(l: *mut ffi::lua_State, index: c_int, key: &CStr) {
    let index = absindex(l, index);
    ffi::lua_pushstring(l, key.as_ptr());
    ffi::lua_rawget(l, index);
}

/// Pops a value and stores it as `t[key]` where `t` is at `index`, bypassing
/// metamethods.
///
/// The caller must have reserved one stack slot.
pub(crate) unsafe fn set_raw_field(l: *mut ffi::lua_State, index: c_int, key: &CStr) {
    let index = absindex(l, index);
    ffi::lua_pushstring(l, key.as_ptr());
    ffi::lua_insert(l, -2);
    ffi::lua_rawset(l, index);
}

/// Like [`get_raw_field`], with the stack check included.
pub(crate) unsafe fn rawgetfield(l: *mut ffi::lua_State, index: c_int, key: &CStr) -> Result<()> {
    let index = absindex(l, index);
    checkstack(l, 1)?;
    get_raw_field(l, index, key);
    Ok(())
}

/// Reads a string or number at `index` as text.
///
/// Numbers are converted on a copy so the original slot keeps its type.
/// Returns `None` for every other kind of value.
pub(crate) unsafe fn to_text(l: *mut ffi::lua_State, index: c_int) -> Option<String> {
    match ffi::lua_type(l, index) {
        ffi::LUA_TSTRING => Some(read_string(l, index)),
        ffi::LUA_TNUMBER => {
            if ffi::lua_checkstack(l, 1) == 0 {
                return None;
            }
            ffi::lua_pushvalue(l, index);
            let text = read_string(l, -1);
            ffi::lua_pop(l, 1);
            Some(text)
        }
        _ => None,
    }
}

unsafe fn read_string(l: *mut ffi::lua_State, index: c_int) -> String {
    let mut len = 0usize;
    let data = ffi::lua_tolstring(l, index, &mut len);
    if data.is_null() {
        return String::new();
    }
    let bytes = slice::from_raw_parts(data as *const u8, len);
    String::from_utf8_lossy(bytes).into_owned()
}
