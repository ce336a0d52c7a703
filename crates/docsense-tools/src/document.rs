//! Document tools: PDF → markdown conversion, markdown text/image
//! extraction, and image loading for multimodal turns.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use regex::Regex;
use serde_json::Value;

use docsense_common::sanitize::sanitize_filename;
use docsense_common::temp::TempStore;

use crate::Tool;

// ── pdf_to_markdown ───────────────────────────────────────────────────────────

pub struct PdfToMarkdownTool {
    store: Arc<TempStore>,
}

impl PdfToMarkdownTool {
    pub fn new(store: Arc<TempStore>) -> Self {
        Self { store }
    }
}

/// Extract per-page text and lay it out as one markdown section per page.
pub fn pdf_to_markdown_text(pdf_path: &Path) -> Result<String> {
    let pdf = lopdf::Document::load(pdf_path)?;
    let pages: Vec<u32> = pdf.get_pages().keys().copied().collect();
    if pages.is_empty() {
        anyhow::bail!("PDF has no pages: {}", pdf_path.display());
    }

    let mut md = String::new();
    for page in pages {
        let text = pdf.extract_text(&[page]).unwrap_or_default();
        md.push_str(&format!("## Page {page}\n\n"));
        md.push_str(text.trim());
        md.push_str("\n\n");
    }
    Ok(md)
}

#[async_trait]
impl Tool for PdfToMarkdownTool {
    fn name(&self) -> &str {
        "pdf_to_markdown"
    }

    fn description(&self) -> &str {
        "Convert a PDF file to a markdown file in the scratch directory and \
         return the generated file's absolute path. Follow up with \
         extract_text_and_images to read the converted content."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pdf_path": { "type": "string", "description": "Path of the PDF file to convert." },
                "fname_base": { "type": "string", "description": "Output filename prefix; defaults to the PDF's stem." }
            },
            "required": ["pdf_path"]
        })
    }

    async fn invoke(&self, params: Value) -> Result<String> {
        let pdf_path = params["pdf_path"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing required parameter: pdf_path"))?;
        let pdf_path = std::fs::canonicalize(pdf_path)
            .map_err(|_| anyhow::anyhow!("file does not exist: {pdf_path}"))?;

        let base = params["fname_base"]
            .as_str()
            .map(str::to_string)
            .or_else(|| pdf_path.file_stem().map(|s| s.to_string_lossy().to_string()))
            .unwrap_or_else(|| "document".to_string());
        let base = sanitize_filename(&base);

        let md = pdf_to_markdown_text(&pdf_path)?;
        let out_path = self.store.root().join(format!("{base}.md"));
        std::fs::write(&out_path, md)?;

        Ok(out_path.to_string_lossy().to_string())
    }
}

// ── extract_text_and_images ───────────────────────────────────────────────────

pub struct ExtractTextAndImagesTool;

impl ExtractTextAndImagesTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExtractTextAndImagesTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Split markdown into plain text and the image targets it references.
/// Relative targets are resolved against `base_dir`.
pub fn extract_text_and_images(markdown: &str, base_dir: &Path) -> (String, Vec<String>) {
    let image_re = Regex::new(r"!\[[^\]]*\]\(([^)\s]+)[^)]*\)").unwrap();

    let mut images = Vec::new();
    for cap in image_re.captures_iter(markdown) {
        let target = &cap[1];
        if target.starts_with("http://") || target.starts_with("https://") || target.starts_with("data:") {
            images.push(target.to_string());
        } else {
            let path = PathBuf::from(target);
            let resolved = if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            };
            images.push(resolved.to_string_lossy().to_string());
        }
    }

    let text = image_re.replace_all(markdown, "").to_string();
    (text, images)
}

#[async_trait]
impl Tool for ExtractTextAndImagesTool {
    fn name(&self) -> &str {
        "extract_text_and_images"
    }

    fn description(&self) -> &str {
        "Parse a markdown file and return JSON {text, images}: the document \
         text with image references removed, and the image paths/URLs it \
         references. Load each image with load_image."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "md_path": { "type": "string", "description": "Path of the markdown file to parse." }
            },
            "required": ["md_path"]
        })
    }

    async fn invoke(&self, params: Value) -> Result<String> {
        let md_path = params["md_path"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing required parameter: md_path"))?;
        let md_path = std::fs::canonicalize(md_path)
            .map_err(|_| anyhow::anyhow!("file does not exist: {md_path}"))?;

        let content = std::fs::read_to_string(&md_path)?;
        let base_dir = md_path.parent().unwrap_or_else(|| Path::new("."));
        let (text, images) = extract_text_and_images(&content, base_dir);

        Ok(serde_json::to_string(&serde_json::json!({
            "text": text,
            "images": images,
        }))?)
    }
}

// ── load_image ────────────────────────────────────────────────────────────────

pub struct LoadImageTool;

impl LoadImageTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoadImageTool {
    fn default() -> Self {
        Self::new()
    }
}

fn media_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl Tool for LoadImageTool {
    fn name(&self) -> &str {
        "load_image"
    }

    fn description(&self) -> &str {
        "Read an image file and return it as a base64 data URL suitable for \
         a multimodal message part."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "image_path": { "type": "string", "description": "Path of the image file to load." }
            },
            "required": ["image_path"]
        })
    }

    async fn invoke(&self, params: Value) -> Result<String> {
        let image_path = params["image_path"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing required parameter: image_path"))?;
        let path = std::fs::canonicalize(image_path)
            .map_err(|_| anyhow::anyhow!("file does not exist: {image_path}"))?;

        let bytes = std::fs::read(&path)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        Ok(format!("data:{};base64,{encoded}", media_type_for(&path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_and_resolves_image_targets() {
        let md = "intro\n![fig 1](image_1.jpeg)\nmiddle\n![](https://example.com/x.png)\ntail";
        let (text, images) = extract_text_and_images(md, Path::new("/work/temp"));
        assert_eq!(
            images,
            vec!["/work/temp/image_1.jpeg", "https://example.com/x.png"]
        );
        assert!(text.contains("intro"));
        assert!(text.contains("tail"));
        assert!(!text.contains("image_1.jpeg"));
    }

    #[test]
    fn absolute_targets_stay_put() {
        let md = "![a](/data/img.png)";
        let (_, images) = extract_text_and_images(md, Path::new("/elsewhere"));
        assert_eq!(images, vec!["/data/img.png"]);
    }

    #[test]
    fn media_types_follow_extension() {
        assert_eq!(media_type_for(Path::new("a.PNG")), "image/png");
        assert_eq!(media_type_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(media_type_for(Path::new("a.bin")), "application/octet-stream");
    }

    #[tokio::test]
    async fn load_image_emits_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("dot.png");
        std::fs::write(&img, [0x89, 0x50, 0x4E, 0x47]).unwrap();

        let out = LoadImageTool::new()
            .invoke(serde_json::json!({ "image_path": img.to_string_lossy() }))
            .await
            .unwrap();
        assert!(out.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn missing_file_is_an_invoke_error() {
        let err = LoadImageTool::new()
            .invoke(serde_json::json!({ "image_path": "/no/such/file.png" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
