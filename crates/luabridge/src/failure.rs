//! Host failures travelling through Lua code
//!
//! When a host callable fails, the failure is boxed into tagged userdata and
//! raised as the Lua error value. Lua code can pass it around or print it;
//! the protected call that eventually receives it recognises the metatable and
//! hands the original failure back to host code:
//! - an [`Error`] comes back as a clone, keeping its concrete type
//! - a panic payload is moved out and resumed as the same panic

use mlua_sys as ffi;
use std::any::Any;
use std::mem::ManuallyDrop;
use std::os::raw::{c_char, c_int};

use crate::error::Error;
use crate::raw::HOST_EXCEPTION_METATABLE;
use crate::userdata;

/// Label for panic payloads that are neither `&str` nor `String`
pub(crate) const NON_STRING_PANIC: &str = "<non-string panic payload>";

/// A host failure stored inside Lua
pub(crate) enum WrappedFailure {
    Error(Error),
    /// `None` once the payload has been resumed
    Panic(Option<Box<dyn Any + Send>>),
}

/// A failure taken back out of Lua
pub(crate) enum Resumed {
    Error(Error),
    Panic(Box<dyn Any + Send>),
}

impl WrappedFailure {
    pub(crate) fn resume(&mut self) -> Resumed {
        match self {
            WrappedFailure::Error(err) => Resumed::Error(err.clone()),
            WrappedFailure::Panic(payload) => match payload.take() {
                Some(payload) => Resumed::Panic(payload),
                None => Resumed::Error(Error::PreviouslyResumedPanic),
            },
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            WrappedFailure::Error(err) => err.to_string(),
            WrappedFailure::Panic(Some(payload)) => panic_message(payload.as_ref())
                .unwrap_or(NON_STRING_PANIC)
                .to_string(),
            WrappedFailure::Panic(None) => Error::PreviouslyResumedPanic.to_string(),
        }
    }
}

/// Text of a panic payload raised with `panic!`
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> Option<&str> {
    if let Some(s) = payload.downcast_ref::<&str>() {
        Some(*s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        Some(s.as_str())
    } else {
        None
    }
}

/// Pushes `failure` as tagged userdata.
///
/// The failure is held without drop glue while Lua allocates, so a memory
/// error raised by the allocation cannot skip a destructor. The caller must
/// have reserved two stack slots.
pub(crate) unsafe fn push_failure(l: *mut ffi::lua_State, failure: WrappedFailure) {
    let failure = ManuallyDrop::new(failure);
    userdata::push_tagged(l, HOST_EXCEPTION_METATABLE, move || ManuallyDrop::into_inner(failure));
}

/// `__tostring` handler of the host exception metatable
pub(crate) unsafe extern "C-unwind" fn failure_to_string(l: *mut ffi::lua_State) -> c_int {
    let failure = ffi::lua_touserdata(l, 1) as *const WrappedFailure;
    let text = ManuallyDrop::new(if failure.is_null() {
        NON_STRING_PANIC.to_string()
    } else {
        (*failure).describe()
    });
    ffi::lua_pushlstring(l, text.as_ptr() as *const c_char, text.len());
    drop(ManuallyDrop::into_inner(text));
    1
}
