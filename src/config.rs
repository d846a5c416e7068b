// Sable interpreter configuration
// Loaded from JSON; every field has a default so partial files are fine

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Emit `debug(...)` lines through the output sink
    pub debug: bool,
    /// Call depth at which a catchable stack overflow error is raised
    pub max_call_depth: usize,
    /// Stack size for script-spawned threads, in bytes
    pub thread_stack_size: usize,
    /// Directory that `import a.b` paths are resolved against
    pub import_root: PathBuf,
    /// File extension of importable libraries
    pub library_extension: String,
    /// Never reach for remote libraries when resolving imports
    pub local_imports_only: bool,
    pub main_thread_name: String,
    /// How often a blocked `await` re-checks its thread for stop requests
    pub await_poll_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            max_call_depth: 1024,
            thread_stack_size: 8 * 1024 * 1024,
            import_root: PathBuf::from("."),
            library_extension: "sbl".to_string(),
            local_imports_only: true,
            main_thread_name: "Main Thread".to_string(),
            await_poll_ms: 25,
        }
    }
}

impl Config {
    pub fn from_json_str(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| format!("Invalid configuration: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading config '{}': {}", path.display(), e))?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = Config::from_json_str(r#"{ "debug": true, "maxCallDepth": 64 }"#).unwrap();
        assert!(config.debug);
        assert_eq!(config.max_call_depth, 64);
        assert_eq!(config.library_extension, "sbl");
        assert_eq!(config.main_thread_name, "Main Thread");
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let error = Config::from_json_str("{ \"debug\": 3 }").unwrap_err();
        assert!(error.starts_with("Invalid configuration"));
    }
}
