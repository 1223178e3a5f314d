//! Protected-mode trampolines
//!
//! Each trampoline is a Lua C function performing one API operation that may
//! raise a Lua error, either directly or through a metamethod. They are only
//! ever invoked under `lua_pcall`, through [`State::call`](crate::State::call)
//! except for [`pin_value`], which runs while a failed call is being reported.
//! Operands arrive on the trampoline's own stack, results are left there with
//! a fixed arity.

use mlua_sys as ffi;
use std::os::raw::c_int;

use crate::failure::{self, WrappedFailure};
use crate::function::{self, Callable};
use crate::raw::{self, ERROR_NAMESPACE, HOST_EXCEPTION_METATABLE, HOST_FUNCTION_METATABLE, THIS_STATE};
use crate::userdata;

/// Stack: `n` values. Results: their concatenation.
pub(crate) unsafe extern "C-unwind" fn concat(l: *mut ffi::lua_State) -> c_int {
    ffi::lua_concat(l, ffi::lua_gettop(l));
    1
}

/// Stack: `a`, `b`. Results: one boolean, `a OP b`.
///
/// `OP` is one of `LUA_OPEQ`, `LUA_OPLT` or `LUA_OPLE`.
pub(crate) unsafe extern "C-unwind" fn compare<const OP: c_int>(l: *mut ffi::lua_State) -> c_int {
    let result = ffi::lua_compare(l, 1, 2, OP);
    ffi::lua_pop(l, 2);
    ffi::lua_pushboolean(l, result);
    1
}

/// A table operation indexing the table at a given stack slot
pub(crate) trait TableAccess {
    /// Number of values left for the caller
    const RESULTS: c_int;

    unsafe fn access(l: *mut ffi::lua_State, index: c_int);
}

/// `t[k]`
pub(crate) struct Get;

/// `t[k] = v`
pub(crate) struct Set;

impl TableAccess for Get {
    const RESULTS: c_int = 1;

    unsafe fn access(l: *mut ffi::lua_State, index: c_int) {
        ffi::lua_gettable(l, index);
    }
}

impl TableAccess for Set {
    const RESULTS: c_int = 0;

    unsafe fn access(l: *mut ffi::lua_State, index: c_int) {
        ffi::lua_settable(l, index);
    }
}

/// Stack: `t`, `k` (and `v` for [`Set`]). Results: `A::RESULTS`.
pub(crate) unsafe extern "C-unwind" fn table_access<A: TableAccess>(l: *mut ffi::lua_State) -> c_int {
    A::access(l, 1);
    A::RESULTS
}

/// Stack: `what`, `data`. Results: the integer returned by `lua_gc`.
pub(crate) unsafe extern "C-unwind" fn gc(l: *mut ffi::lua_State) -> c_int {
    let what = ffi::lua_tointeger(l, -2) as c_int;
    let data = ffi::lua_tointeger(l, -1) as c_int;
    ffi::lua_pop(l, 2);
    let result = ffi::lua_gc(l, what, data);
    ffi::lua_pushinteger(l, result as ffi::lua_Integer);
    1
}

/// Stack: `t`, `k`. Results: `k'`, `v'`, `true`, or only `false` once the
/// table is exhausted.
pub(crate) unsafe extern "C-unwind" fn next(l: *mut ffi::lua_State) -> c_int {
    let more = ffi::lua_next(l, 1);
    ffi::lua_checkstack(l, 1);
    ffi::lua_pushboolean(l, more);
    if more != 0 {
        3
    } else {
        1
    }
}

/// Stack: an error value. Results: its registry reference in the error
/// namespace, or `LUA_NOREF` while the namespace does not exist yet.
pub(crate) unsafe extern "C-unwind" fn pin_value(l: *mut ffi::lua_State) -> c_int {
    ffi::lua_settop(l, 1);
    raw::get_raw_field(l, ffi::LUA_REGISTRYINDEX, ERROR_NAMESPACE);
    let key = if ffi::lua_type(l, -1) == ffi::LUA_TTABLE {
        ffi::lua_insert(l, 1);
        ffi::luaL_ref(l, 1)
    } else {
        ffi::LUA_NOREF
    };
    ffi::lua_settop(l, 0);
    ffi::lua_pushinteger(l, key as ffi::lua_Integer);
    1
}

/// Stack: light pointer to the owning `State`, open-libs flag. Results: none.
///
/// Stores the back-pointer, creates the private metatables and the error
/// namespace, then opens the standard libraries if asked to.
pub(crate) unsafe extern "C-unwind" fn init_state(l: *mut ffi::lua_State) -> c_int {
    let open_libs = ffi::lua_toboolean(l, 2) != 0;
    ffi::lua_settop(l, 1);

    raw::set_raw_field(l, ffi::LUA_REGISTRYINDEX, THIS_STATE);

    ffi::lua_createtable(l, 0, 0);
    raw::set_raw_field(l, ffi::LUA_REGISTRYINDEX, ERROR_NAMESPACE);

    ffi::luaL_newmetatable(l, HOST_EXCEPTION_METATABLE.as_ptr());
    ffi::lua_pushcfunction(l, failure::failure_to_string);
    raw::set_raw_field(l, -2, c"__tostring");
    ffi::lua_pushboolean(l, 0);
    raw::set_raw_field(l, -2, c"__metatable");
    ffi::lua_pushcfunction(l, userdata::drop_tagged::<WrappedFailure>);
    raw::set_raw_field(l, -2, c"__gc");
    ffi::lua_pop(l, 1);

    ffi::luaL_newmetatable(l, HOST_FUNCTION_METATABLE.as_ptr());
    ffi::lua_pushboolean(l, 0);
    raw::set_raw_field(l, -2, c"__metatable");
    ffi::lua_pushcfunction(l, userdata::drop_tagged::<Callable>);
    raw::set_raw_field(l, -2, c"__gc");
    ffi::lua_pop(l, 1);

    if open_libs {
        ffi::luaL_openlibs(l);
    }
    0
}

/// Stack: light pointer to an `Option<Callable>` slot, then `n` upvalues.
/// Results: a closure over the callable and the upvalues.
///
/// The callable is moved out of the slot only after the stack has room, so
/// the slot still owns it if the call fails early.
pub(crate) unsafe extern "C-unwind" fn new_closure(l: *mut ffi::lua_State) -> c_int {
    let upvalues = ffi::lua_gettop(l) - 1;
    let slot = ffi::lua_touserdata(l, 1) as *mut Option<Callable>;
    ffi::lua_remove(l, 1);

    ffi::lua_checkstack(l, 2);
    let Some(callable) = (*slot).take() else {
        return 0;
    };
    let callable = std::mem::ManuallyDrop::new(callable);
    userdata::push_tagged(l, HOST_FUNCTION_METATABLE, move || {
        std::mem::ManuallyDrop::into_inner(callable)
    });
    ffi::lua_insert(l, 1);

    ffi::lua_pushcclosure(l, function::closure_trampoline, upvalues + 1);
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_trampoline_joins_everything() {
        unsafe {
            let l = ffi::luaL_newstate();
            ffi::lua_pushcfunction(l, concat);
            for part in ["a", "b", "c"] {
                ffi::lua_pushlstring(l, part.as_ptr() as *const _, part.len());
            }
            ffi::lua_pushinteger(l, 1);

            assert_eq!(ffi::lua_pcall(l, 4, 1, 0), ffi::LUA_OK);
            assert_eq!(raw::to_text(l, -1).as_deref(), Some("abc1"));

            ffi::lua_close(l);
        }
    }

    #[test]
    fn test_compare_trampoline_leaves_boolean() {
        unsafe {
            let l = ffi::luaL_newstate();
            ffi::lua_pushcfunction(l, compare::<{ ffi::LUA_OPLT }>);
            ffi::lua_pushinteger(l, 1);
            ffi::lua_pushinteger(l, 2);

            assert_eq!(ffi::lua_pcall(l, 2, 1, 0), ffi::LUA_OK);
            assert_eq!(ffi::lua_type(l, -1), ffi::LUA_TBOOLEAN);
            assert_ne!(ffi::lua_toboolean(l, -1), 0);

            ffi::lua_close(l);
        }
    }

    #[test]
    fn test_compare_trampoline_propagates_errors() {
        unsafe {
            let l = ffi::luaL_newstate();
            ffi::lua_pushcfunction(l, compare::<{ ffi::LUA_OPLT }>);
            ffi::lua_pushinteger(l, 1);
            ffi::lua_createtable(l, 0, 0);

            // comparing a number with a table raises inside the protected call
            assert_eq!(ffi::lua_pcall(l, 2, 1, 0), ffi::LUA_ERRRUN);
            assert!(raw::to_text(l, -1).unwrap().contains("compare"));

            ffi::lua_close(l);
        }
    }

    #[test]
    fn test_next_trampoline_reports_exhaustion() {
        unsafe {
            let l = ffi::luaL_newstate();
            ffi::lua_createtable(l, 0, 0);
            let table = ffi::lua_gettop(l);

            ffi::lua_pushcfunction(l, next);
            ffi::lua_pushvalue(l, table);
            ffi::lua_pushnil(l);
            assert_eq!(ffi::lua_pcall(l, 2, ffi::LUA_MULTRET, 0), ffi::LUA_OK);

            assert_eq!(ffi::lua_gettop(l), table + 1);
            assert_eq!(ffi::lua_type(l, -1), ffi::LUA_TBOOLEAN);
            assert_eq!(ffi::lua_toboolean(l, -1), 0);

            ffi::lua_close(l);
        }
    }

    #[test]
    fn test_pin_value_without_namespace() {
        unsafe {
            let l = ffi::luaL_newstate();
            ffi::lua_pushcfunction(l, pin_value);
            ffi::lua_pushinteger(l, 5);

            assert_eq!(ffi::lua_pcall(l, 1, 1, 0), ffi::LUA_OK);
            assert_eq!(ffi::lua_gettop(l), 1);
            assert_eq!(ffi::lua_tointeger(l, -1) as c_int, ffi::LUA_NOREF);

            ffi::lua_close(l);
        }
    }

    #[test]
    fn test_pin_value_stores_in_namespace() {
        unsafe {
            let l = ffi::luaL_newstate();
            ffi::lua_createtable(l, 0, 0);
            raw::set_raw_field(l, ffi::LUA_REGISTRYINDEX, ERROR_NAMESPACE);

            ffi::lua_pushcfunction(l, pin_value);
            ffi::lua_pushinteger(l, 99);
            assert_eq!(ffi::lua_pcall(l, 1, 1, 0), ffi::LUA_OK);
            let key = ffi::lua_tointeger(l, -1);
            ffi::lua_pop(l, 1);
            assert!(key > 0);

            raw::get_raw_field(l, ffi::LUA_REGISTRYINDEX, ERROR_NAMESPACE);
            ffi::lua_rawgeti(l, -1, key);
            assert_eq!(ffi::lua_tointeger(l, -1), 99);

            ffi::lua_close(l);
        }
    }
}
