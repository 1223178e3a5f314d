//! `luabridge eval`: Evaluate an inline chunk.

use super::{format_value, lua_failure, prepare_state};

pub fn execute(code: &str, bare: bool) -> anyhow::Result<()> {
    let state = prepare_state(bare)?;
    let base = state.top();
    let results = state.do_string(code).map_err(lua_failure)?;

    if results > 0 {
        let line: Vec<String> = (base + 1..=base + results)
            .map(|index| format_value(&state, index))
            .collect();
        println!("{}", line.join("\t"));
    }
    Ok(())
}
