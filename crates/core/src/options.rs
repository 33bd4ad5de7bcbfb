use serde::{Deserialize, Serialize};

/// Reader behaviour toggles.
///
/// Deserializable so a host application can embed it in its own config:
///
/// ```toml
/// [confreader]
/// reload = true
/// dict_cache = false
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Re-parse the file on read when its modification time advanced.
    pub reload: bool,
    /// Memoize materialized sections until the next reload.
    pub dict_cache: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            reload: true,
            dict_cache: false,
        }
    }
}

impl ReaderOptions {
    #[must_use]
    pub fn with_reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }

    #[must_use]
    pub fn with_dict_cache(mut self, dict_cache: bool) -> Self {
        self.dict_cache = dict_cache;
        self
    }
}
