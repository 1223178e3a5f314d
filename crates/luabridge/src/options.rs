//! Configuration of a Lua state

/// Default name reported for chunks loaded from strings
pub const DEFAULT_CHUNK_NAME: &str = "=chunk";

/// Options applied when creating a [`State`](crate::State)
#[derive(Debug, Clone)]
pub struct StateOptions {
    /// Open the Lua standard libraries
    pub open_libs: bool,

    /// Chunk name used by [`State::load_string`](crate::State::load_string)
    pub chunk_name: String,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            open_libs: true,
            chunk_name: DEFAULT_CHUNK_NAME.to_string(),
        }
    }
}

impl StateOptions {
    /// A state without the standard libraries
    pub fn bare() -> Self {
        Self {
            open_libs: false,
            ..Default::default()
        }
    }

    /// Use `name` for chunks loaded from strings
    pub fn with_chunk_name(mut self, name: impl Into<String>) -> Self {
        self.chunk_name = name.into();
        self
    }
}
