//! Report writer: persist model-generated markdown to disk.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use docsense_common::sanitize::sanitize_filename;

use crate::Tool;

pub struct WriteMarkdownTool;

impl WriteMarkdownTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WriteMarkdownTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the final output path: sanitized name, `.md` suffix enforced,
/// `-1`, `-2`… appended instead of clobbering unless `overwrite`.
pub fn resolve_target(base_dir: &Path, filename: Option<&str>, overwrite: bool) -> (PathBuf, bool) {
    let name = match filename.map(str::trim).filter(|f| !f.is_empty()) {
        // Only the final component counts; directories come from `dir`.
        Some(f) => Path::new(f)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "untitled".to_string()),
        None => chrono::Local::now().format("%Y-%m-%d_%H%M%S").to_string(),
    };

    let mut name = sanitize_filename(&name);
    if !name.to_ascii_lowercase().ends_with(".md") {
        name.push_str(".md");
    }

    let target = base_dir.join(&name);
    if !target.exists() {
        return (target, false);
    }
    if overwrite {
        return (target, true);
    }

    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "untitled".to_string());
    let mut i = 1;
    loop {
        let candidate = base_dir.join(format!("{stem}-{i}.md"));
        if !candidate.exists() {
            return (candidate, false);
        }
        i += 1;
    }
}

#[async_trait]
impl Tool for WriteMarkdownTool {
    fn name(&self) -> &str {
        "write_markdown"
    }

    fn description(&self) -> &str {
        "Write markdown content to a .md file. Defaults to ./output with a \
         timestamped filename; existing files get a -1/-2 suffix unless \
         overwrite is set. Returns JSON describing the written file."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "Markdown text to write." },
                "dir": { "type": "string", "description": "Target directory; defaults to ./output." },
                "filename": { "type": "string", "description": "Filename, .md suffix optional." },
                "overwrite": { "type": "boolean", "description": "Replace an existing file instead of suffixing." }
            },
            "required": ["content"]
        })
    }

    async fn invoke(&self, params: Value) -> Result<String> {
        let content = params["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing required parameter: content"))?;
        let dir = params["dir"].as_str().filter(|d| !d.is_empty()).unwrap_or("./output");
        let overwrite = params["overwrite"].as_bool().unwrap_or(false);

        let base_dir = PathBuf::from(dir);
        let created_dir = !base_dir.exists();
        std::fs::create_dir_all(&base_dir)?;

        let (target, overwritten) = resolve_target(&base_dir, params["filename"].as_str(), overwrite);
        std::fs::write(&target, content)?;

        let abs = std::fs::canonicalize(&target)?;
        let abs_dir = std::fs::canonicalize(&base_dir)?;
        Ok(serde_json::to_string(&serde_json::json!({
            "path": abs.to_string_lossy(),
            "dir": abs_dir.to_string_lossy(),
            "filename": target.file_name().map(|n| n.to_string_lossy().to_string()),
            "bytes_written": content.len(),
            "overwritten": overwritten,
            "created_dir": created_dir,
        }))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("reports");

        let result = WriteMarkdownTool::new()
            .invoke(serde_json::json!({
                "content": "# Findings\n",
                "dir": out.to_string_lossy(),
                "filename": "summary"
            }))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&result).unwrap();

        assert_eq!(v["filename"], "summary.md");
        assert_eq!(v["created_dir"], true);
        assert_eq!(v["overwritten"], false);
        assert_eq!(v["bytes_written"], 11);
        assert_eq!(
            std::fs::read_to_string(out.join("summary.md")).unwrap(),
            "# Findings\n"
        );
    }

    #[tokio::test]
    async fn existing_file_gets_suffix_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteMarkdownTool::new();
        let args = serde_json::json!({
            "content": "one",
            "dir": dir.path().to_string_lossy(),
            "filename": "report.md"
        });

        tool.invoke(args.clone()).await.unwrap();
        let second: Value = serde_json::from_str(&tool.invoke(args.clone()).await.unwrap()).unwrap();
        let third: Value = serde_json::from_str(&tool.invoke(args).await.unwrap()).unwrap();

        assert_eq!(second["filename"], "report-1.md");
        assert_eq!(third["filename"], "report-2.md");
    }

    #[tokio::test]
    async fn overwrite_replaces_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteMarkdownTool::new();
        let mk = |content: &str| {
            serde_json::json!({
                "content": content,
                "dir": dir.path().to_string_lossy(),
                "filename": "report",
                "overwrite": true
            })
        };

        tool.invoke(mk("first")).await.unwrap();
        let v: Value = serde_json::from_str(&tool.invoke(mk("second")).await.unwrap()).unwrap();

        assert_eq!(v["overwritten"], true);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("report.md")).unwrap(),
            "second"
        );
    }

    #[tokio::test]
    async fn filenames_are_sanitized_to_one_component() {
        let dir = tempfile::tempdir().unwrap();
        let result = WriteMarkdownTool::new()
            .invoke(serde_json::json!({
                "content": "x",
                "dir": dir.path().to_string_lossy(),
                "filename": "../escape"
            }))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&result).unwrap();
        // `..` is taken as the raw name and sanitized, never as a directory hop.
        assert_eq!(v["filename"], "escape.md");
        assert!(dir.path().join("escape.md").exists());
    }
}
