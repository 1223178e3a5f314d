//! `luabridge run`: Execute a Lua file.

use std::path::Path;
use tracing::debug;

use super::{lua_failure, prepare_state};

pub fn execute(path: &Path, bare: bool) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }

    let state = prepare_state(bare)?;
    let results = state.do_file(path).map_err(lua_failure)?;
    debug!(file = %path.display(), results, "script finished");

    Ok(())
}
