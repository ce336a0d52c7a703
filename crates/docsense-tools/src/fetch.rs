//! Web fetch tools: structured text and page metadata from a URL.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::Tool;

/// HTTP client capped to http/https and an optional host allowlist.
/// `None` permits any host; non-http schemes and opaque URLs are always
/// refused.
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: reqwest::Client,
    allowlist: Option<HashSet<String>>,
}

impl FetchClient {
    pub fn new(allowlist: Option<HashSet<String>>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client, allowlist }
    }

    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return false;
        }
        let Some(host) = parsed.host_str() else {
            return false;
        };
        match &self.allowlist {
            None => true,
            Some(hosts) => hosts
                .iter()
                .any(|allowed| host == allowed || host.ends_with(&format!(".{allowed}"))),
        }
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        if !self.is_allowed(url) {
            anyhow::bail!("URL not allowed by fetch policy: {url}");
        }
        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.text().await?)
    }
}

// ── HTML → structured text ────────────────────────────────────────────────────

fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when the nearest list ancestor is `<ol>`.
fn in_ordered_list(el: &ElementRef) -> bool {
    for ancestor in el.ancestors() {
        if let Some(parent) = ElementRef::wrap(ancestor) {
            match parent.value().name() {
                "ol" => return true,
                "ul" => return false,
                _ => {}
            }
        }
    }
    false
}

/// Flatten a document into markdown-ish lines: `#` headings, paragraphs,
/// list items, `[text](href)` links, in document order.
pub fn structured_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut lines = Vec::new();

    for el in doc.root_element().descendants().filter_map(ElementRef::wrap) {
        let tag = el.value().name();
        let text = clean_text(&el.text().collect::<String>());
        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                if !text.is_empty() {
                    let level = tag[1..].parse::<usize>().unwrap_or(1);
                    lines.push(format!("{} {text}", "#".repeat(level)));
                }
            }
            "p" => {
                if !text.is_empty() {
                    lines.push(text);
                }
            }
            "li" => {
                if !text.is_empty() {
                    let prefix = if in_ordered_list(&el) { "- " } else { "* " };
                    lines.push(format!("{prefix}{text}"));
                }
            }
            "a" => {
                if let Some(href) = el.value().attr("href") {
                    if !text.is_empty() {
                        lines.push(format!("[{text}]({href})"));
                    }
                }
            }
            _ => {}
        }
    }

    lines.join("\n")
}

// ── HTML → metadata ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub author: String,
}

pub fn page_metadata(html: &str) -> PageMetadata {
    let doc = Html::parse_document(html);
    let mut meta = PageMetadata::default();

    for el in doc.root_element().descendants().filter_map(ElementRef::wrap) {
        match el.value().name() {
            "title" => {
                if meta.title.is_empty() {
                    meta.title = clean_text(&el.text().collect::<String>());
                }
            }
            "meta" => {
                let key = el
                    .value()
                    .attr("name")
                    .or_else(|| el.value().attr("property"))
                    .unwrap_or("")
                    .to_ascii_lowercase();
                let content = el.value().attr("content").unwrap_or("");
                match key.as_str() {
                    "description" => meta.description = content.to_string(),
                    "keywords" => {
                        meta.keywords = content
                            .split(',')
                            .map(|k| k.trim().to_string())
                            .filter(|k| !k.is_empty())
                            .collect();
                    }
                    "author" => meta.author = content.to_string(),
                    k if k.contains("og:title") => {
                        if !content.is_empty() {
                            meta.title = content.to_string();
                        }
                    }
                    k if k.contains("og:description") => {
                        if !content.is_empty() {
                            meta.description = content.to_string();
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    meta
}

// ── Tools ─────────────────────────────────────────────────────────────────────

fn url_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "url": { "type": "string", "description": "Page URL to fetch (http/https)." }
        },
        "required": ["url"]
    })
}

fn url_param(params: &Value) -> Result<&str> {
    params["url"]
        .as_str()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing required parameter: url"))
}

pub struct StructuredTextTool {
    http: FetchClient,
}

impl StructuredTextTool {
    pub fn new(http: FetchClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Tool for StructuredTextTool {
    fn name(&self) -> &str {
        "fetch_structured_text"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its content as structured plain text: \
         headings, paragraphs, list items and links in document order."
    }

    fn parameters_schema(&self) -> Value {
        url_schema()
    }

    async fn invoke(&self, params: Value) -> Result<String> {
        let url = url_param(&params)?;
        let html = self.http.get_text(url).await?;
        Ok(structured_text(&html))
    }
}

pub struct PageMetadataTool {
    http: FetchClient,
}

impl PageMetadataTool {
    pub fn new(http: FetchClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Tool for PageMetadataTool {
    fn name(&self) -> &str {
        "fetch_page_metadata"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its title, description, keywords and \
         author extracted from <title> and <meta> tags."
    }

    fn parameters_schema(&self) -> Value {
        url_schema()
    }

    async fn invoke(&self, params: Value) -> Result<String> {
        let url = url_param(&params)?;
        let html = self.http.get_text(url).await?;
        Ok(serde_json::to_string(&page_metadata(&html))?)
    }
}
