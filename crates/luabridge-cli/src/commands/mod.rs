//! Subcommand implementations

pub mod eval;
pub mod run;

use luabridge::{Error, LuaType, State, StateOptions};
use std::pin::Pin;

/// Create a state with the driver's host functions registered:
/// - `fail(msg)` raises `msg` as a host error
/// - `version()` returns the driver version
pub fn prepare_state(bare: bool) -> anyhow::Result<Pin<Box<State>>> {
    let options = if bare {
        StateOptions::bare()
    } else {
        StateOptions::default()
    };
    let state = State::new(options).map_err(lua_failure)?;

    state
        .register("fail", |state| {
            let message = state
                .to_string(1)
                .unwrap_or_else(|_| "failure requested by script".to_string());
            Err(Error::external(message))
        })
        .map_err(lua_failure)?;

    state
        .register("version", |state| {
            state.push_string(env!("CARGO_PKG_VERSION"))?;
            Ok(1)
        })
        .map_err(lua_failure)?;

    Ok(state)
}

/// Convert a bridge error, which is bound to its thread, into an `anyhow` error
pub fn lua_failure(err: Error) -> anyhow::Error {
    anyhow::anyhow!("{}", err)
}

/// Render the value at `index` for display
pub fn format_value(state: &State, index: i32) -> String {
    match state.type_of(index) {
        LuaType::Nil | LuaType::None => "nil".to_string(),
        LuaType::Boolean => state.to_boolean(index).to_string(),
        LuaType::Number | LuaType::String => state
            .to_string(index)
            .unwrap_or_else(|_| "?".to_string()),
        other => other.name().to_string(),
    }
}
