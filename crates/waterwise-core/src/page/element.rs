use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Owned snapshot of one rendered DOM element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub classes: Vec<String>,
    /// Text owned directly by this element, excluding children.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub children: Vec<Element>,
}

/// The subset of CSS selectors the message scan relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `[name="value"]`
    Attr { name: String, value: String },
    /// `tag[name="value"]`
    TagAttr { tag: String, name: String, value: String },
    /// `.a.b.c`
    Classes(Vec<String>),
    /// `[class*="fragment"]`
    ClassContains(String),
}

impl Selector {
    pub fn attr(name: &str, value: &str) -> Self {
        Selector::Attr {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    pub fn tag_attr(tag: &str, name: &str, value: &str) -> Self {
        Selector::TagAttr {
            tag: tag.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    pub fn classes(classes: &[&str]) -> Self {
        Selector::Classes(classes.iter().map(|c| c.to_string()).collect())
    }

    pub fn class_contains(fragment: &str) -> Self {
        Selector::ClassContains(fragment.to_string())
    }
}

/// A matched element together with its parent, when it has one.
#[derive(Debug, Clone, Copy)]
pub struct Located<'a> {
    pub node: &'a Element,
    pub parent: Option<&'a Element>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// The `class` attribute as the browser would serialize it.
    pub fn class_attr(&self) -> String {
        self.classes.join(" ")
    }

    /// Concatenated text of this element and all descendants, like `textContent`.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            child.collect_text(out);
        }
    }

    pub fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::Attr { name, value } => self.attr(name) == Some(value.as_str()),
            Selector::TagAttr { tag, name, value } => {
                self.tag.eq_ignore_ascii_case(tag) && self.attr(name) == Some(value.as_str())
            }
            Selector::Classes(classes) => {
                !classes.is_empty() && classes.iter().all(|c| self.has_class(c))
            }
            Selector::ClassContains(fragment) => self.class_attr().contains(fragment.as_str()),
        }
    }

    /// All descendants matching `selector`, in document order. Like
    /// `querySelectorAll`, the element itself is not a candidate.
    pub fn find_all(&self, selector: &Selector) -> Vec<Located<'_>> {
        let mut found = Vec::new();
        self.collect_matches(selector, &mut found);
        found
    }

    fn collect_matches<'a>(&'a self, selector: &Selector, found: &mut Vec<Located<'a>>) {
        for child in &self.children {
            if child.matches(selector) {
                found.push(Located {
                    node: child,
                    parent: Some(self),
                });
            }
            child.collect_matches(selector, found);
        }
    }

    pub fn find_first(&self, selector: &Selector) -> Option<&Element> {
        self.children.iter().find_map(|child| {
            if child.matches(selector) {
                Some(child)
            } else {
                child.find_first(selector)
            }
        })
    }

    pub fn contains(&self, selector: &Selector) -> bool {
        self.find_first(selector).is_some()
    }
}
