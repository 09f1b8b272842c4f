//! Store configuration, read from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// How to open a Gentle store.
///
/// # Example
///
/// ```toml
/// backend = "fs"
/// data_dir = "/var/lib/gentle"
/// journaled = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GentleConfig {
    /// Registry name of the backend: `"memory"` or `"fs"` by default.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Root directory for backends that persist to disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Create missing directories on open.
    #[serde(default = "default_create")]
    pub create: bool,
    /// Keep a snapshot journal over the backend.
    #[serde(default)]
    pub journaled: bool,
    /// Log every store operation at `debug`.
    #[serde(default)]
    pub trace: bool,
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_create() -> bool {
    true
}

impl Default for GentleConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: None,
            create: default_create(),
            journaled: false,
            trace: false,
        }
    }
}

impl GentleConfig {
    /// An in-memory store.
    pub fn memory() -> Self {
        Self::default()
    }

    /// A filesystem store rooted at `dir`.
    pub fn fs(dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: "fs".to_string(),
            data_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn journaled(mut self, on: bool) -> Self {
        self.journaled = on;
        self
    }

    pub fn traced(mut self, on: bool) -> Self {
        self.trace = on;
        self
    }

    /// The data directory, or an error naming the backend that needs one.
    pub fn require_data_dir(&self) -> SdkResult<&Path> {
        self.data_dir.as_deref().ok_or_else(|| {
            SdkError::Config(format!("backend {:?} requires data_dir", self.backend))
        })
    }

    pub fn from_toml(text: &str) -> SdkResult<Self> {
        toml::from_str(text).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }

    /// Read and parse a config file.
    pub fn from_file(path: &Path) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SdkError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&text)
            .map_err(|e| SdkError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Default config file content, with comments.
    pub fn default_toml() -> &'static str {
        r#"# Gentle store configuration
#
# Backend: "memory" (default) or "fs"
backend = "memory"

# Root directory for the "fs" backend (content_db/ and pointer_db/ live here)
# data_dir = "/var/lib/gentle"

# Create missing directories on open (default: true)
create = true

# Keep a snapshot journal of every change (default: false)
journaled = false

# Log every store operation under the gentle::trace target (default: false)
trace = false
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = GentleConfig::default();
        assert_eq!(c.backend, "memory");
        assert!(c.data_dir.is_none());
        assert!(c.create);
        assert!(!c.journaled);
        assert!(!c.trace);
        assert_eq!(GentleConfig::from_toml("").unwrap(), c);
    }

    #[test]
    fn default_toml_parses_to_defaults() {
        let c = GentleConfig::from_toml(GentleConfig::default_toml()).unwrap();
        assert_eq!(c, GentleConfig::default());
    }

    #[test]
    fn parses_fs_config() {
        let c = GentleConfig::from_toml(
            "backend = \"fs\"\ndata_dir = \"/tmp/g\"\njournaled = true\ncreate = false\n",
        )
        .unwrap();
        assert_eq!(c.backend, "fs");
        assert_eq!(c.require_data_dir().unwrap(), Path::new("/tmp/g"));
        assert!(c.journaled);
        assert!(!c.create);
    }

    #[test]
    fn rejects_bad_toml() {
        assert!(matches!(
            GentleConfig::from_toml("journaled = \"yes\"").unwrap_err(),
            SdkError::Config(_)
        ));
    }

    #[test]
    fn toml_roundtrip() {
        let c = GentleConfig::fs("/data").journaled(true).traced(true);
        let parsed = GentleConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, c);
    }

    #[test]
    fn file_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gentle.toml");
        std::fs::write(&path, "trace = true\n").unwrap();
        let c = GentleConfig::from_file(&path).unwrap();
        assert!(c.trace);
        assert!(GentleConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn missing_data_dir() {
        let c = GentleConfig {
            backend: "fs".into(),
            ..GentleConfig::default()
        };
        assert!(matches!(c.require_data_dir(), Err(SdkError::Config(_))));
    }
}
