pub mod config;
pub mod navigation;
pub mod normalize;
pub mod observation;
pub mod query;
pub mod result;

pub use config::{Config, FanInConfig, LoggingConfig, MatchingConfig};
pub use navigation::{PageSnapshot, PageView, TabId};
pub use observation::{Availability, ObservationRecord};
pub use query::{CombineMode, EvaluationTask, ListingFilters, Query, QueryGroup, QuerySet};
pub use result::{CoverageResult, SessionResult, SessionStats};
