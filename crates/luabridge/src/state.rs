//! Lua state ownership and stack operations
//!
//! A [`State`] owns one Lua interpreter and its [`ValidityFlag`]. Every
//! operation that may raise a Lua error is routed through [`State::call`] by
//! pushing the matching trampoline, so host frames are never crossed by a Lua
//! error jump.
//!
//! Stack indices follow the Lua C API: positive indices count from the bottom
//! of the current frame, negative ones from the top.

use mlua_sys as ffi;
use std::cell::Cell;
use std::ffi::{c_void, CString};
use std::marker::PhantomPinned;
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::pin::Pin;
use std::ptr;
use tracing::debug;

use crate::error::{Error, Result};
use crate::exception::LuaError;
use crate::function::Callable;
use crate::options::StateOptions;
use crate::protect;
use crate::raw::{self, THIS_STATE};
use crate::trampoline::{self, Get, Set};
use crate::validity::ValidityFlag;

/// Request all results from [`State::call`]
pub const MULTRET: c_int = ffi::LUA_MULTRET;

/// Pseudo-index of the Lua registry
pub const REGISTRYINDEX: c_int = ffi::LUA_REGISTRYINDEX;

// ============================================================================
// Value Types
// ============================================================================

/// Basic type of a stack slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuaType {
    /// Index does not refer to a stack slot
    None,
    /// `nil`
    Nil,
    /// `true` / `false`
    Boolean,
    /// Light userdata
    LightUserdata,
    /// Integer or float
    Number,
    /// String
    String,
    /// Table
    Table,
    /// Lua or C function
    Function,
    /// Full userdata
    Userdata,
    /// Coroutine
    Thread,
}

impl LuaType {
    fn from_raw(ty: c_int) -> Self {
        match ty {
            ffi::LUA_TNIL => LuaType::Nil,
            ffi::LUA_TBOOLEAN => LuaType::Boolean,
            ffi::LUA_TLIGHTUSERDATA => LuaType::LightUserdata,
            ffi::LUA_TNUMBER => LuaType::Number,
            ffi::LUA_TSTRING => LuaType::String,
            ffi::LUA_TTABLE => LuaType::Table,
            ffi::LUA_TFUNCTION => LuaType::Function,
            ffi::LUA_TUSERDATA => LuaType::Userdata,
            ffi::LUA_TTHREAD => LuaType::Thread,
            _ => LuaType::None,
        }
    }

    /// Name as reported by Lua's `type()`
    pub fn name(self) -> &'static str {
        match self {
            LuaType::None => "no value",
            LuaType::Nil => "nil",
            LuaType::Boolean => "boolean",
            LuaType::LightUserdata | LuaType::Userdata => "userdata",
            LuaType::Number => "number",
            LuaType::String => "string",
            LuaType::Table => "table",
            LuaType::Function => "function",
            LuaType::Thread => "thread",
        }
    }
}

/// Garbage collector commands accepted by [`State::gc`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcCommand {
    /// Stop the collector
    Stop,
    /// Restart the collector
    Restart,
    /// Run a full collection cycle
    Collect,
    /// Memory in use, in kilobytes
    Count,
    /// Remainder of the memory in use, in bytes
    CountBytes,
    /// Perform an incremental step of the given size
    Step(i32),
    /// Whether the collector is running
    IsRunning,
}

impl GcCommand {
    fn code(self) -> c_int {
        match self {
            GcCommand::Stop => ffi::LUA_GCSTOP,
            GcCommand::Restart => ffi::LUA_GCRESTART,
            GcCommand::Collect => ffi::LUA_GCCOLLECT,
            GcCommand::Count => ffi::LUA_GCCOUNT,
            GcCommand::CountBytes => ffi::LUA_GCCOUNTB,
            GcCommand::Step(_) => ffi::LUA_GCSTEP,
            GcCommand::IsRunning => ffi::LUA_GCISRUNNING,
        }
    }

    fn data(self) -> c_int {
        match self {
            GcCommand::Step(size) => size,
            _ => 0,
        }
    }
}

// ============================================================================
// State
// ============================================================================

/// An embedded Lua interpreter.
///
/// Created pinned on the heap: the Lua registry keeps a pointer back to the
/// `State` so registered host functions can reach it.
pub struct State {
    main: *mut ffi::lua_State,
    /// Thread whose stack operations apply to; differs from `main` while a
    /// host function runs inside a coroutine
    current: Cell<*mut ffi::lua_State>,
    valid: ValidityFlag,
    options: StateOptions,
    _pinned: PhantomPinned,
}

impl State {
    /// Create a new Lua state.
    ///
    /// Fails with [`Error::Memory`] if the interpreter cannot be allocated.
    pub fn new(options: StateOptions) -> Result<Pin<Box<State>>> {
        let main = unsafe { ffi::luaL_newstate() };
        if main.is_null() {
            return Err(Error::Memory);
        }
        unsafe {
            ffi::lua_atpanic(main, protect::panic_hook);
        }

        let state = Box::pin(State {
            main,
            current: Cell::new(main),
            valid: ValidityFlag::new(),
            options,
            _pinned: PhantomPinned,
        });
        // on failure the state is dropped, which closes the interpreter
        state.initialize()?;

        debug!(open_libs = state.options.open_libs, "lua state created");
        Ok(state)
    }

    fn initialize(&self) -> Result<()> {
        let l = self.as_ptr();
        unsafe {
            raw::checkstack(l, 3)?;
            ffi::lua_pushcfunction(l, trampoline::init_state);
            ffi::lua_pushlightuserdata(l, self as *const State as *mut c_void);
            ffi::lua_pushboolean(l, self.options.open_libs as c_int);
        }
        self.call(2, 0, 0)
    }

    /// Options this state was created with
    pub fn options(&self) -> &StateOptions {
        &self.options
    }

    /// A handle on the liveness flag of this state
    pub fn validity(&self) -> ValidityFlag {
        self.valid.clone()
    }

    pub(crate) fn validity_flag(&self) -> &ValidityFlag {
        &self.valid
    }

    /// Raw handle of the thread stack operations currently apply to
    pub(crate) fn as_ptr(&self) -> *mut ffi::lua_State {
        self.current.get()
    }

    pub(crate) fn main_ptr(&self) -> *mut ffi::lua_State {
        self.main
    }

    /// Look up the `State` owning `l` through the registry back-pointer.
    pub(crate) unsafe fn from_registry<'a>(l: *mut ffi::lua_State) -> Option<&'a State> {
        raw::rawgetfield(l, ffi::LUA_REGISTRYINDEX, THIS_STATE).ok()?;
        let state = ffi::lua_touserdata(l, -1) as *const State;
        ffi::lua_pop(l, 1);
        state.as_ref()
    }

    /// Direct stack operations to `thread` until the guard drops.
    pub(crate) fn enter_thread(&self, thread: *mut ffi::lua_State) -> ThreadGuard<'_> {
        let previous = self.current.replace(thread);
        ThreadGuard {
            state: self,
            previous,
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load a chunk from a file and leave it on the stack as a function
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = CString::new(path.as_ref().as_os_str().as_encoded_bytes()).map_err(Error::external)?;
        let l = self.as_ptr();
        let status = unsafe {
            raw::checkstack(l, 1)?;
            ffi::luaL_loadfilex(l, path.as_ptr(), ptr::null())
        };
        self.load_status(status)
    }

    /// Load a chunk from memory and leave it on the stack as a function.
    ///
    /// Both source text and precompiled chunks are accepted.
    pub fn load_buffer(&self, chunk: &[u8], name: &str) -> Result<()> {
        let name = CString::new(name).map_err(Error::external)?;
        let l = self.as_ptr();
        let status = unsafe {
            raw::checkstack(l, 1)?;
            ffi::luaL_loadbufferx(
                l,
                chunk.as_ptr() as *const c_char,
                chunk.len(),
                name.as_ptr(),
                ptr::null(),
            )
        };
        self.load_status(status)
    }

    /// Load source text under the configured chunk name
    pub fn load_string(&self, source: &str) -> Result<()> {
        self.load_buffer(source.as_bytes(), &self.options.chunk_name)
    }

    fn load_status(&self, status: c_int) -> Result<()> {
        match status {
            ffi::LUA_OK => Ok(()),
            ffi::LUA_ERRMEM => {
                self.pop(1);
                Err(Error::Memory)
            }
            ffi::LUA_ERRSYNTAX => Err(Error::Syntax(unsafe { LuaError::from_top(self)? })),
            ffi::LUA_ERRFILE => Err(Error::File(unsafe { LuaError::from_top(self)? })),
            _ => Err(Error::Runtime(unsafe { LuaError::from_top(self)? })),
        }
    }

    /// Load and run source text, returning the number of results it left
    pub fn do_string(&self, source: &str) -> Result<c_int> {
        let base = self.top();
        self.load_string(source)?;
        self.call(0, MULTRET, 0)?;
        Ok(self.top() - base)
    }

    /// Load and run a file, returning the number of results it left
    pub fn do_file(&self, path: impl AsRef<Path>) -> Result<c_int> {
        let base = self.top();
        self.load_file(path)?;
        self.call(0, MULTRET, 0)?;
        Ok(self.top() - base)
    }

    // ========================================================================
    // Protected Operations
    // ========================================================================

    /// Ensure room for `extra` more values on the stack
    pub fn check_stack(&self, extra: c_int) -> Result<()> {
        unsafe { raw::checkstack(self.as_ptr(), extra) }
    }

    /// Replace the top `n` values with their concatenation
    pub fn concat(&self, n: c_int) -> Result<()> {
        debug_assert!(n >= 0);
        let l = self.as_ptr();
        unsafe {
            raw::checkstack(l, 1)?;
            ffi::lua_pushcfunction(l, trampoline::concat);
            ffi::lua_insert(l, -n - 1);
        }
        self.call(n, 1, 0)
    }

    /// `a == b`, honouring `__eq`
    pub fn equal(&self, index1: c_int, index2: c_int) -> Result<bool> {
        // no metamethod can change the answer for identical values
        if self.raw_equal(index1, index2) {
            return Ok(true);
        }
        self.compare(trampoline::compare::<{ ffi::LUA_OPEQ }>, index1, index2)
    }

    /// `a < b`, honouring `__lt`
    pub fn less_than(&self, index1: c_int, index2: c_int) -> Result<bool> {
        self.compare(trampoline::compare::<{ ffi::LUA_OPLT }>, index1, index2)
    }

    /// `a <= b`, honouring `__le`
    pub fn less_equal(&self, index1: c_int, index2: c_int) -> Result<bool> {
        self.compare(trampoline::compare::<{ ffi::LUA_OPLE }>, index1, index2)
    }

    fn compare(&self, trampoline: ffi::lua_CFunction, index1: c_int, index2: c_int) -> Result<bool> {
        // absent operands compare false
        if self.is_none(index1) || self.is_none(index2) {
            return Ok(false);
        }

        let l = self.as_ptr();
        unsafe {
            let index1 = raw::absindex(l, index1);
            let index2 = raw::absindex(l, index2);
            raw::checkstack(l, 3)?;
            ffi::lua_pushcfunction(l, trampoline);
            ffi::lua_pushvalue(l, index1);
            ffi::lua_pushvalue(l, index2);
        }
        self.call(2, 1, 0)?;

        let result = self.to_boolean(-1);
        self.pop(1);
        Ok(result)
    }

    /// Run a garbage collector command and return its result
    pub fn gc(&self, command: GcCommand) -> Result<c_int> {
        let l = self.as_ptr();
        unsafe {
            raw::checkstack(l, 3)?;
            ffi::lua_pushcfunction(l, trampoline::gc);
            ffi::lua_pushinteger(l, command.code() as ffi::lua_Integer);
            ffi::lua_pushinteger(l, command.data() as ffi::lua_Integer);
        }
        self.call(2, 1, 0)?;

        let result = self.to_integer(-1).unwrap_or_default() as c_int;
        self.pop(1);
        Ok(result)
    }

    /// Pop a key and push `t[key]`, where `t` is at `index`
    pub fn get_table(&self, index: c_int) -> Result<()> {
        let l = self.as_ptr();
        unsafe {
            raw::checkstack(l, 2)?;
            ffi::lua_pushvalue(l, index);
            ffi::lua_insert(l, -2);
            ffi::lua_pushcfunction(l, trampoline::table_access::<Get>);
            ffi::lua_insert(l, -3);
        }
        self.call(2, 1, 0)
    }

    /// Push `t[key]`, where `t` is at `index`
    pub fn get_field(&self, index: c_int, key: &str) -> Result<()> {
        let index = unsafe { raw::absindex(self.as_ptr(), index) };
        self.push_string(key)?;
        self.get_table(index)
    }

    /// Pop a key and a value (value on top) and perform `t[key] = value`,
    /// where `t` is at `index`
    pub fn set_table(&self, index: c_int) -> Result<()> {
        let l = self.as_ptr();
        unsafe {
            raw::checkstack(l, 2)?;
            ffi::lua_pushvalue(l, index);
            ffi::lua_insert(l, -3);
            ffi::lua_pushcfunction(l, trampoline::table_access::<Set>);
            ffi::lua_insert(l, -4);
        }
        self.call(3, 0, 0)
    }

    /// Pop a value and perform `t[key] = value`, where `t` is at `index`
    pub fn set_field(&self, index: c_int, key: &str) -> Result<()> {
        let index = unsafe { raw::absindex(self.as_ptr(), index) };
        self.push_string(key)?;
        self.insert(-2);
        self.set_table(index)
    }

    /// Pop a key and push the next key/value pair of the table at `index`.
    ///
    /// Returns `false`, with nothing pushed, once the table is exhausted.
    /// Iteration must not be resumed after that.
    pub fn next(&self, index: c_int) -> Result<bool> {
        let l = self.as_ptr();
        unsafe {
            raw::checkstack(l, 2)?;
            ffi::lua_pushvalue(l, index);
            ffi::lua_insert(l, -2);
            ffi::lua_pushcfunction(l, trampoline::next);
            ffi::lua_insert(l, -3);
        }
        self.call(2, MULTRET, 0)?;

        let more = self.to_boolean(-1);
        self.pop(1);
        Ok(more)
    }

    /// Push the global `name`
    pub fn get_global(&self, name: &str) -> Result<()> {
        self.push_globals()?;
        let result = self.get_field(-1, name);
        match result {
            Ok(()) => self.remove(-2),
            Err(_) => self.pop(1),
        }
        result
    }

    /// Pop a value and store it as the global `name`
    pub fn set_global(&self, name: &str) -> Result<()> {
        let base = self.top() - 1;
        self.push_globals()?;
        self.insert(-2);
        let result = self.set_field(-2, name);
        // the value is consumed either way
        self.set_top(base);
        result
    }

    fn push_globals(&self) -> Result<()> {
        let l = self.as_ptr();
        unsafe {
            raw::checkstack(l, 1)?;
            ffi::lua_rawgeti(l, ffi::LUA_REGISTRYINDEX, ffi::LUA_RIDX_GLOBALS);
        }
        Ok(())
    }

    // ========================================================================
    // Host Functions
    // ========================================================================

    /// Push `f` as a Lua function closing over the top `n` stack values.
    ///
    /// The bound values are popped; inside `f` they are reachable through
    /// [`State::upvalue_index`].
    pub fn push_closure<F>(&self, f: F, n: c_int) -> Result<()>
    where
        F: Fn(&State) -> Result<c_int> + 'static,
    {
        debug_assert!(n >= 0);
        let mut slot: Option<Callable> = Some(Box::new(f));
        let l = self.as_ptr();
        unsafe {
            raw::checkstack(l, 2)?;
            ffi::lua_pushcfunction(l, trampoline::new_closure);
            ffi::lua_insert(l, -n - 1);
            ffi::lua_pushlightuserdata(l, &mut slot as *mut Option<Callable> as *mut c_void);
            ffi::lua_insert(l, -n - 1);
        }
        self.call(n + 1, 1, 0)
    }

    /// Push `f` as a Lua function without upvalues
    pub fn push_function<F>(&self, f: F) -> Result<()>
    where
        F: Fn(&State) -> Result<c_int> + 'static,
    {
        self.push_closure(f, 0)
    }

    /// Register `f` as the global function `name`
    pub fn register<F>(&self, name: &str, f: F) -> Result<()>
    where
        F: Fn(&State) -> Result<c_int> + 'static,
    {
        self.push_function(f)?;
        self.set_global(name)
    }

    /// Pseudo-index of the `i`-th value bound by [`State::push_closure`],
    /// counting from 1. Only meaningful inside a host function.
    pub fn upvalue_index(i: c_int) -> c_int {
        // upvalue 1 holds the callable itself
        ffi::lua_upvalueindex(i + 1)
    }

    // ========================================================================
    // Stack Manipulation
    // ========================================================================

    /// Index of the top slot, which is also the number of values on the stack
    pub fn top(&self) -> c_int {
        unsafe { ffi::lua_gettop(self.as_ptr()) }
    }

    /// Set the top to `index`, filling with `nil` or discarding as needed
    pub fn set_top(&self, index: c_int) {
        unsafe { ffi::lua_settop(self.as_ptr(), index) }
    }

    /// Pop `n` values
    pub fn pop(&self, n: c_int) {
        unsafe { ffi::lua_pop(self.as_ptr(), n) }
    }

    /// Move the top value to `index`, shifting the values above it up
    pub fn insert(&self, index: c_int) {
        unsafe { ffi::lua_insert(self.as_ptr(), index) }
    }

    /// Remove the value at `index`, shifting the values above it down
    pub fn remove(&self, index: c_int) {
        unsafe { ffi::lua_remove(self.as_ptr(), index) }
    }

    /// Pop the top value and store it at `index`
    pub fn replace(&self, index: c_int) {
        unsafe { ffi::lua_replace(self.as_ptr(), index) }
    }

    /// Push `nil`
    pub fn push_nil(&self) -> Result<()> {
        let l = self.as_ptr();
        unsafe {
            raw::checkstack(l, 1)?;
            ffi::lua_pushnil(l);
        }
        Ok(())
    }

    /// Push a boolean
    pub fn push_boolean(&self, value: bool) -> Result<()> {
        let l = self.as_ptr();
        unsafe {
            raw::checkstack(l, 1)?;
            ffi::lua_pushboolean(l, value as c_int);
        }
        Ok(())
    }

    /// Push an integer
    pub fn push_integer(&self, value: i64) -> Result<()> {
        let l = self.as_ptr();
        unsafe {
            raw::checkstack(l, 1)?;
            ffi::lua_pushinteger(l, value as ffi::lua_Integer);
        }
        Ok(())
    }

    /// Push a float
    pub fn push_number(&self, value: f64) -> Result<()> {
        let l = self.as_ptr();
        unsafe {
            raw::checkstack(l, 1)?;
            ffi::lua_pushnumber(l, value as ffi::lua_Number);
        }
        Ok(())
    }

    /// Push a string
    pub fn push_string(&self, value: &str) -> Result<()> {
        let l = self.as_ptr();
        unsafe {
            raw::checkstack(l, 1)?;
            ffi::lua_pushlstring(l, value.as_ptr() as *const c_char, value.len());
        }
        Ok(())
    }

    /// Push a copy of the value at `index`
    pub fn push_value(&self, index: c_int) -> Result<()> {
        let l = self.as_ptr();
        unsafe {
            raw::checkstack(l, 1)?;
            ffi::lua_pushvalue(l, index);
        }
        Ok(())
    }

    /// Push a new empty table
    pub fn new_table(&self) -> Result<()> {
        let l = self.as_ptr();
        unsafe {
            raw::checkstack(l, 1)?;
            ffi::lua_createtable(l, 0, 0);
        }
        Ok(())
    }

    /// Push `t[key]` without invoking metamethods
    pub fn raw_get_field(&self, index: c_int, key: &str) -> Result<()> {
        let l = self.as_ptr();
        unsafe {
            let index = raw::absindex(l, index);
            raw::checkstack(l, 1)?;
            ffi::lua_pushlstring(l, key.as_ptr() as *const c_char, key.len());
            ffi::lua_rawget(l, index);
        }
        Ok(())
    }

    /// Pop a value and store it as `t[key]` without invoking metamethods
    pub fn raw_set_field(&self, index: c_int, key: &str) -> Result<()> {
        let l = self.as_ptr();
        unsafe {
            let index = raw::absindex(l, index);
            raw::checkstack(l, 1)?;
            ffi::lua_pushlstring(l, key.as_ptr() as *const c_char, key.len());
            ffi::lua_insert(l, -2);
            ffi::lua_rawset(l, index);
        }
        Ok(())
    }

    // ========================================================================
    // Stack Access
    // ========================================================================

    /// Type of the value at `index`
    pub fn type_of(&self, index: c_int) -> LuaType {
        LuaType::from_raw(unsafe { ffi::lua_type(self.as_ptr(), index) })
    }

    /// Whether `index` refers to no stack slot at all
    pub fn is_none(&self, index: c_int) -> bool {
        self.type_of(index) == LuaType::None
    }

    /// Whether the value at `index` is `nil`
    pub fn is_nil(&self, index: c_int) -> bool {
        self.type_of(index) == LuaType::Nil
    }

    /// Whether both values are primitively equal, without metamethods
    pub fn raw_equal(&self, index1: c_int, index2: c_int) -> bool {
        unsafe { ffi::lua_rawequal(self.as_ptr(), index1, index2) != 0 }
    }

    /// Truthiness of the value at `index`
    pub fn to_boolean(&self, index: c_int) -> bool {
        unsafe { ffi::lua_toboolean(self.as_ptr(), index) != 0 }
    }

    /// The value at `index` as an integer, if it is convertible to one
    pub fn to_integer(&self, index: c_int) -> Option<i64> {
        let mut isnum = 0;
        let value = unsafe { ffi::lua_tointegerx(self.as_ptr(), index, &mut isnum) };
        (isnum != 0).then_some(value as i64)
    }

    /// The value at `index` as a float, if it is convertible to one
    pub fn to_number(&self, index: c_int) -> Option<f64> {
        let mut isnum = 0;
        let value = unsafe { ffi::lua_tonumberx(self.as_ptr(), index, &mut isnum) };
        (isnum != 0).then_some(value as f64)
    }

    /// The string or number at `index` as text.
    ///
    /// Fails with [`Error::NotString`] for any other value.
    pub fn to_string(&self, index: c_int) -> Result<String> {
        unsafe { raw::to_text(self.as_ptr(), index) }.ok_or(Error::NotString)
    }
}

impl Drop for State {
    fn drop(&mut self) {
        // flip the flag first: collecting userdata below may drop errors
        // that still point into this state
        self.valid.invalidate();
        unsafe { ffi::lua_close(self.main) };
        debug!("lua state closed");
    }
}

/// Restores the previous current thread on drop
pub(crate) struct ThreadGuard<'a> {
    state: &'a State,
    previous: *mut ffi::lua_State,
}

impl Drop for ThreadGuard<'_> {
    fn drop(&mut self) {
        self.state.current.set(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_state() -> Pin<Box<State>> {
        State::new(StateOptions::default()).unwrap()
    }

    #[test]
    fn test_state_lifecycle() {
        let state = new_state();
        let flag = state.validity();
        assert!(flag.is_valid());
        assert_eq!(state.top(), 0);

        drop(state);
        assert!(!flag.is_valid());
    }

    #[test]
    fn test_registry_points_back_at_state() {
        let state = new_state();
        let found = unsafe { State::from_registry(state.as_ptr()) }.unwrap();
        assert!(ptr::eq(found, &*state));
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn test_bare_state_has_no_libraries() {
        let state = State::new(StateOptions::bare()).unwrap();
        state.get_global("string").unwrap();
        assert!(state.is_nil(-1));
        state.pop(1);

        let full = new_state();
        full.get_global("string").unwrap();
        assert_eq!(full.type_of(-1), LuaType::Table);
    }

    #[test]
    fn test_check_stack_unreasonable_request() {
        let state = new_state();
        assert!(state.check_stack(16).is_ok());
        assert!(matches!(state.check_stack(c_int::MAX), Err(Error::Memory)));
    }

    #[test]
    fn test_stack_helpers() {
        let state = new_state();
        state.push_integer(1).unwrap();
        state.push_string("two").unwrap();
        state.push_boolean(true).unwrap();
        state.push_nil().unwrap();
        state.push_number(4.5).unwrap();
        assert_eq!(state.top(), 5);

        assert_eq!(state.type_of(1), LuaType::Number);
        assert_eq!(state.type_of(2), LuaType::String);
        assert_eq!(state.type_of(3), LuaType::Boolean);
        assert!(state.is_nil(4));
        assert!(state.is_none(6));
        assert_eq!(state.to_number(5), Some(4.5));
        assert_eq!(state.to_integer(2), None);

        state.push_value(1).unwrap();
        assert!(state.raw_equal(1, -1));
        state.insert(1);
        state.remove(2);
        state.replace(1);
        assert_eq!(state.to_string(1).unwrap(), "4.5");

        state.set_top(0);
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(LuaType::Table.name(), "table");
        assert_eq!(LuaType::LightUserdata.name(), "userdata");
        assert_eq!(LuaType::None.name(), "no value");
    }

    #[test]
    fn test_gc_command_codes() {
        assert_eq!(GcCommand::Step(7).code(), ffi::LUA_GCSTEP);
        assert_eq!(GcCommand::Step(7).data(), 7);
        assert_eq!(GcCommand::Collect.data(), 0);
    }

    #[test]
    fn test_errors_collected_during_close_see_closed_state() {
        use std::rc::Rc;

        // reads the flag at the moment its error is released
        struct Observer {
            err: LuaError,
            seen: Rc<Cell<Option<bool>>>,
        }

        impl Drop for Observer {
            fn drop(&mut self) {
                self.seen.set(Some(self.err.is_state_alive()));
            }
        }

        let seen = Rc::new(Cell::new(None));
        let state = new_state();
        let err = match state.do_string("error({ kept = true })") {
            Err(Error::Runtime(err)) => err,
            other => panic!("expected a runtime error, got {:?}", other),
        };
        let observer = Observer {
            err,
            seen: Rc::clone(&seen),
        };
        state
            .register("holder", move |_| {
                let _ = &observer;
                Ok(0)
            })
            .unwrap();
        assert_eq!(seen.get(), None);

        // the callable, and the error inside it, are collected by lua_close
        drop(state);
        assert_eq!(seen.get(), Some(false));
    }
}
