//! `registry.json` — the list of tool servers to launch at startup.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use docsense_common::Result;

use crate::client::ServerSpec;
use crate::manager::McpManager;

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryFile {
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
}

impl RegistryFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Connect every usable registry entry. Invalid entries and per-server
/// connection failures are logged and skipped, never fatal.
pub async fn connect_registry(manager: &mut McpManager, registry: &RegistryFile) {
    for entry in &registry.servers {
        let (name, script) = match (&entry.name, &entry.script) {
            (Some(n), Some(s)) if !n.is_empty() && !s.is_empty() => (n, s),
            _ => {
                tracing::warn!(?entry, "skipping invalid server entry");
                continue;
            }
        };

        let script_path = match std::fs::canonicalize(script) {
            Ok(p) => p,
            Err(_) => {
                tracing::warn!(server = %name, script = %script, "server script not found, skipping");
                continue;
            }
        };

        let spec = ServerSpec::from_script(&script_path);
        tracing::info!(server = %name, script = %script_path.display(), "connecting tool server");
        if let Err(e) = manager.connect(name, spec).await {
            tracing::error!(server = %name, error = %e, "failed to connect tool server");
        }
    }
}

/// Resolve the registry path: `DOCSENSE_REGISTRY` env var, else
/// `registry.json` in the working directory.
pub fn registry_path() -> PathBuf {
    std::env::var("DOCSENSE_REGISTRY")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("registry.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_server_list() {
        let json = r#"{ "servers": [ { "name": "toolbox", "script": "./docsense-toolbox" } ] }"#;
        let reg: RegistryFile = serde_json::from_str(json).unwrap();
        assert_eq!(reg.servers.len(), 1);
        assert_eq!(reg.servers[0].name.as_deref(), Some("toolbox"));
    }

    #[test]
    fn missing_fields_deserialize_to_none() {
        let json = r#"{ "servers": [ { "name": "broken" }, {} ] }"#;
        let reg: RegistryFile = serde_json::from_str(json).unwrap();
        assert_eq!(reg.servers.len(), 2);
        assert!(reg.servers[0].script.is_none());
        assert!(reg.servers[1].name.is_none());
    }

    #[tokio::test]
    async fn invalid_entries_are_skipped_without_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, r#"{{ "servers": [ {{ "name": "x" }}, {{ "name": "y", "script": "/no/such/script.py" }} ] }}"#).unwrap();

        let registry = RegistryFile::load(&path).unwrap();
        let mut mgr = McpManager::new();
        connect_registry(&mut mgr, &registry).await;
        assert!(mgr.is_empty());
    }
}
