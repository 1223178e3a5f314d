//! Host callables exposed to Lua
//!
//! A [`Callable`] is stored in tagged userdata and closed over by
//! [`closure_trampoline`], the single C entry point shared by every registered
//! function. The trampoline runs the callable, and when it fails raises the
//! failure as a Lua error. All host values are dropped before `lua_error`
//! jumps back to the nearest protected call.

use mlua_sys as ffi;
use std::os::raw::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use tracing::trace;

use crate::error::Result;
use crate::failure::{self, WrappedFailure};
use crate::state::State;

/// A host function callable from Lua.
///
/// Arguments are on the stack at indices `1..=top`; bound upvalues are at
/// [`State::upvalue_index`]. The returned count is the number of values on
/// top of the stack handed back to Lua.
pub type Callable = Box<dyn Fn(&State) -> Result<c_int>>;

const MISSING_STATE: &str = "host function called outside of its lua state";

/// Raised instead of a host failure that found no stack space
const STACK_EXHAUSTED: &str = "not enough stack space to raise host failure";

enum Dispatch {
    Return(c_int),
    /// Raise the value already on top, or this failure
    Raise(Option<WrappedFailure>),
}

/// Entry point of every registered host function
pub(crate) unsafe extern "C-unwind" fn closure_trampoline(l: *mut ffi::lua_State) -> c_int {
    match dispatch(l) {
        Dispatch::Return(nresults) => nresults,
        Dispatch::Raise(failure) => {
            if let Some(failure) = failure {
                if ffi::lua_checkstack(l, 2) != 0 {
                    failure::push_failure(l, failure);
                } else {
                    drop(failure);
                    // free one slot so the raised value is never a leftover argument
                    if ffi::lua_gettop(l) > 0 {
                        ffi::lua_pop(l, 1);
                    }
                    ffi::lua_pushlstring(l, STACK_EXHAUSTED.as_ptr() as *const c_char, STACK_EXHAUSTED.len());
                }
            }
            // no host value is alive past this point
            ffi::lua_error(l)
        }
    }
}

unsafe fn dispatch(l: *mut ffi::lua_State) -> Dispatch {
    let state = match State::from_registry(l) {
        Some(state) => state,
        None => {
            ffi::lua_pushlstring(l, MISSING_STATE.as_ptr() as *const c_char, MISSING_STATE.len());
            return Dispatch::Raise(None);
        }
    };
    let _thread = state.enter_thread(l);

    let callable = ffi::lua_touserdata(l, ffi::lua_upvalueindex(1)) as *const Callable;
    if callable.is_null() {
        ffi::lua_pushlstring(l, MISSING_STATE.as_ptr() as *const c_char, MISSING_STATE.len());
        return Dispatch::Raise(None);
    }

    match panic::catch_unwind(AssertUnwindSafe(|| (*callable)(state))) {
        Ok(Ok(nresults)) => Dispatch::Return(nresults),
        Ok(Err(err)) => {
            // errors raised by this state travel as their original value
            if let Some(lua_err) = err.lua_error() {
                if lua_err.push(state).is_ok() {
                    return Dispatch::Raise(None);
                }
            }
            trace!(error = %err, "raising host error in lua");
            Dispatch::Raise(Some(WrappedFailure::Error(err)))
        }
        Err(payload) => {
            trace!("raising host panic in lua");
            Dispatch::Raise(Some(WrappedFailure::Panic(Some(payload))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::options::StateOptions;
    use crate::raw;

    #[test]
    fn test_trampoline_outside_state() {
        unsafe {
            let l = ffi::luaL_newstate();
            ffi::lua_pushcclosure(l, closure_trampoline, 0);

            assert_eq!(ffi::lua_pcall(l, 0, 0, 0), ffi::LUA_ERRRUN);
            assert_eq!(raw::to_text(l, -1).as_deref(), Some(MISSING_STATE));

            ffi::lua_close(l);
        }
    }

    #[test]
    fn test_returned_count() {
        let state = State::new(StateOptions::default()).unwrap();
        state
            .register("pair", |state| {
                state.push_integer(1)?;
                state.push_integer(2)?;
                Ok(2)
            })
            .unwrap();

        assert_eq!(state.do_string("return pair()").unwrap(), 2);
        assert_eq!(state.to_integer(-2), Some(1));
        assert_eq!(state.to_integer(-1), Some(2));
    }

    #[test]
    fn test_own_lua_error_raised_as_original_value() {
        let state = State::new(StateOptions::default()).unwrap();
        state
            .register("inner", |state| {
                state.do_string("error({ tag = 'inner' })")?;
                Ok(0)
            })
            .unwrap();

        state
            .do_string("local ok, e = pcall(inner); return type(e), e.tag")
            .unwrap();
        assert_eq!(state.to_string(-2).unwrap(), "table");
        assert_eq!(state.to_string(-1).unwrap(), "inner");
    }

    #[test]
    fn test_host_error_raised_as_userdata() {
        let state = State::new(StateOptions::default()).unwrap();
        state
            .register("fail", |_| Err(Error::NotString))
            .unwrap();

        state
            .do_string("local ok, e = pcall(fail); return type(e)")
            .unwrap();
        assert_eq!(state.to_string(-1).unwrap(), "userdata");
    }

    #[test]
    fn test_exhausted_stack_raises_fixed_message() {
        let state = State::new(StateOptions::default()).unwrap();
        state
            .register("flood", |state| {
                while state.push_boolean(true).is_ok() {}
                Err(Error::external("lost"))
            })
            .unwrap();

        match state.do_string("flood(1, 2, 3)") {
            Err(Error::Runtime(err)) => assert_eq!(err.message(), STACK_EXHAUSTED),
            other => panic!("expected a runtime error, got {:?}", other),
        }
        assert_eq!(state.top(), 0);
    }
}
