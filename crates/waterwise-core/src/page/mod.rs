//! Owned snapshots of the chat page.
//!
//! The live DOM belongs to the host (browser, test harness, CLI replay).
//! The engine only ever sees a [`Page`] handed over by a [`PageSource`].

pub mod element;

pub use element::{Element, Located, Selector};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::models::chat_id_from_url;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub url: String,
    pub root: Element,
}

impl Page {
    pub fn new(url: &str, root: Element) -> Self {
        Self {
            url: url.to_string(),
            root,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse page snapshot")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read page snapshot: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid page snapshot: {}", path.display()))
    }

    pub fn chat_id(&self) -> String {
        chat_id_from_url(&self.url)
    }

    /// Like `document.querySelectorAll`: the root itself is a candidate too.
    pub fn find_all(&self, selector: &Selector) -> Vec<Located<'_>> {
        let mut found = Vec::new();
        if self.root.matches(selector) {
            found.push(Located {
                node: &self.root,
                parent: None,
            });
        }
        found.extend(self.root.find_all(selector));
        found
    }

    pub fn contains(&self, selector: &Selector) -> bool {
        self.root.matches(selector) || self.root.contains(selector)
    }
}

/// Supplies the current page whenever a processing pass runs.
pub trait PageSource: Send + Sync + 'static {
    /// `None` when no page is loaded yet.
    fn snapshot(&self) -> Option<Page>;
}

/// A page slot the host overwrites as the DOM changes.
#[derive(Debug, Clone, Default)]
pub struct SharedPage {
    inner: Arc<RwLock<Option<Page>>>,
}

impl SharedPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, page: Page) {
        *self.inner.write() = Some(page);
    }
}

impl PageSource for SharedPage {
    fn snapshot(&self) -> Option<Page> {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_snapshot_json() {
        let json = r#"{
            "url": "https://chatgpt.com/c/abc",
            "root": {
                "tag": "body",
                "children": [
                    {"tag": "div", "attributes": {"data-message-author-role": "assistant"}, "text": "hi there"}
                ]
            }
        }"#;
        let page = Page::from_json(json).unwrap();
        assert_eq!(page.chat_id(), "abc");
        let found = page.find_all(&Selector::attr("data-message-author-role", "assistant"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node.text_content(), "hi there");
    }

    #[test]
    fn test_invalid_snapshot_is_error() {
        assert!(Page::from_json("{not json").is_err());
    }

    #[test]
    fn test_shared_page_replaces_snapshot() {
        let shared = SharedPage::new();
        assert!(shared.snapshot().is_none());
        shared.replace(Page::new("https://chatgpt.com/c/one", Element::new("body")));
        shared.replace(Page::new("https://chatgpt.com/c/two", Element::new("body")));
        assert_eq!(shared.snapshot().unwrap().chat_id(), "two");
    }
}
