//! Port trait definitions (Hexagonal Architecture)
//!
//! - `PageExtractor`: turns a page handed over by the browser layer into raw
//!   observations
//!
//! The engine never parses pages itself; field extraction heuristics live
//! behind this port.

pub mod errors;
pub mod page_extractor;

pub use errors::ExtractionError;
pub use page_extractor::{PageExtractor, PassthroughExtractor};
