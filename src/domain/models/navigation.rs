//! Navigation-side value types: tabs and the page snapshots they produce.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a browser tab or popup, as assigned by the automation layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TabId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A page as handed over by the browser layer, before extraction.
///
/// `payload` is whatever the browser side captured (structured data blobs,
/// a DOM digest, pre-scraped listings); only the extractor interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageView {
    pub tab: TabId,
    pub url: String,
    #[serde(default)]
    pub payload: Value,
}

/// The extraction output for one page of one tab: zero or more raw
/// observations, shaped however the extractor produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub tab: TabId,
    pub url: String,
    #[serde(default)]
    pub observations: Vec<Value>,
}

impl PageSnapshot {
    pub fn new(tab: impl Into<TabId>, url: impl Into<String>, observations: Vec<Value>) -> Self {
        Self {
            tab: tab.into(),
            url: url.into(),
            observations,
        }
    }
}
