// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod aggregate;
pub mod api;
pub mod config;
pub mod ingest;
pub mod scheduler;
pub mod summary;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{DailyItem, DailyRecord, DailyStore};
pub use crate::api::create_router;
pub use crate::config::AppConfig;
pub use crate::ingest::types::{SourceOutcome, SourceProvider, TrendItem};
pub use crate::summary::{SummaryCache, SummaryEngine, SummaryRecord};
