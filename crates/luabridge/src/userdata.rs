// Tagged userdata: host values stored on the Lua heap and identified by one of
// the private metatables.

use mlua_sys as ffi;
use std::ffi::CStr;
use std::mem;
use std::os::raw::c_int;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use crate::raw;

/// Allocates a userdata block, fills it with `init()` and attaches the
/// metatable registered under `metatable`.
///
/// `init` runs only after the allocation succeeded, so a Lua memory error
/// never leaves a half-initialised block behind. The caller must have
/// reserved two stack slots.
pub(crate) unsafe fn push_tagged<T>(l: *mut ffi::lua_State, metatable: &CStr, init: impl FnOnce() -> T) {
    debug_assert!(mem::align_of::<T>() <= mem::align_of::<ffi::lua_Number>());

    raw::get_raw_field(l, ffi::LUA_REGISTRYINDEX, metatable);
    let block = ffi::lua_newuserdatauv(l, mem::size_of::<T>(), 0) as *mut T;
    ptr::write(block, init());
    ffi::lua_insert(l, -2);
    ffi::lua_setmetatable(l, -2);
}

/// `__gc` handler for blocks created by [`push_tagged`]
pub(crate) unsafe extern "C-unwind" fn drop_tagged<T>(l: *mut ffi::lua_State) -> c_int {
    let block = ffi::lua_touserdata(l, 1) as *mut T;
    if !block.is_null() {
        // a panicking destructor must not unwind into the collector
        let _ = panic::catch_unwind(AssertUnwindSafe(|| ptr::drop_in_place(block)));
    }
    0
}

/// Whether the value at `index` carries the metatable registered under
/// `metatable`. Compared by identity only.
pub(crate) unsafe fn has_tag(l: *mut ffi::lua_State, index: c_int, metatable: &CStr) -> crate::Result<bool> {
    let index = raw::absindex(l, index);
    raw::checkstack(l, 2)?;
    if ffi::lua_getmetatable(l, index) == 0 {
        return Ok(false);
    }
    raw::get_raw_field(l, ffi::LUA_REGISTRYINDEX, metatable);
    let tagged = ffi::lua_rawequal(l, -1, -2) != 0;
    ffi::lua_pop(l, 2);
    Ok(tagged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    const TEST_METATABLE: &CStr = c"luabridge::test_metatable";

    struct Tracked(Rc<Cell<u32>>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    unsafe fn register_metatable(l: *mut ffi::lua_State) {
        ffi::luaL_newmetatable(l, TEST_METATABLE.as_ptr());
        ffi::lua_pushcfunction(l, drop_tagged::<Tracked>);
        raw::set_raw_field(l, -2, c"__gc");
        ffi::lua_pop(l, 1);
    }

    #[test]
    fn test_collected_block_is_dropped_once() {
        let drops = Rc::new(Cell::new(0));
        unsafe {
            let l = ffi::luaL_newstate();
            register_metatable(l);

            let counter = drops.clone();
            push_tagged(l, TEST_METATABLE, move || Tracked(counter));
            assert!(has_tag(l, -1, TEST_METATABLE).unwrap());
            assert!(!has_tag(l, -1, c"luabridge::other").unwrap());

            ffi::lua_pop(l, 1);
            ffi::lua_gc(l, ffi::LUA_GCCOLLECT, 0);
            assert_eq!(drops.get(), 1);

            ffi::lua_close(l);
        }
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_close_drops_live_blocks() {
        let drops = Rc::new(Cell::new(0));
        unsafe {
            let l = ffi::luaL_newstate();
            register_metatable(l);

            let counter = drops.clone();
            push_tagged(l, TEST_METATABLE, move || Tracked(counter));
            assert_eq!(drops.get(), 0);

            ffi::lua_close(l);
        }
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_plain_values_are_untagged() {
        unsafe {
            let l = ffi::luaL_newstate();
            register_metatable(l);

            ffi::lua_pushinteger(l, 1);
            assert!(!has_tag(l, -1, TEST_METATABLE).unwrap());
            ffi::lua_createtable(l, 0, 0);
            assert!(!has_tag(l, -1, TEST_METATABLE).unwrap());

            ffi::lua_close(l);
        }
    }
}
