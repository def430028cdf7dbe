use async_trait::async_trait;
use serde_json::Value;

use super::errors::ExtractionError;
use crate::domain::models::PageView;

/// Extraction collaborator: page in, raw observations out.
///
/// Implementations may be slow (DOM evaluation, scrolling) and are called
/// concurrently for different tabs. Each returned value is a loosely-shaped
/// key/value map; the canonicalizer deals with the shape.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract(&self, page: &PageView) -> Result<Vec<Value>, ExtractionError>;
}

/// Extractor for pages whose payload already holds the observations, as in
/// recorded navigation logs.
///
/// An array payload yields its elements, any other non-null payload yields
/// itself, and a null payload yields nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughExtractor;

#[async_trait]
impl PageExtractor for PassthroughExtractor {
    async fn extract(&self, page: &PageView) -> Result<Vec<Value>, ExtractionError> {
        Ok(match &page.payload {
            Value::Null => Vec::new(),
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TabId;
    use serde_json::json;

    fn page(payload: Value) -> PageView {
        PageView {
            tab: TabId::new("tab-1"),
            url: "https://example.test/event/1".to_string(),
            payload,
        }
    }

    #[tokio::test]
    async fn test_passthrough_shapes() {
        let extractor = PassthroughExtractor;
        let many = extractor.extract(&page(json!([{"name": "a"}, {"name": "b"}]))).await.unwrap();
        assert_eq!(many.len(), 2);

        let one = extractor.extract(&page(json!({"name": "a"}))).await.unwrap();
        assert_eq!(one, vec![json!({"name": "a"})]);

        let none = extractor.extract(&page(Value::Null)).await.unwrap();
        assert!(none.is_empty());
    }
}
