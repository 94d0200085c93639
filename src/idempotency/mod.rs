pub mod handler;
pub mod storage;

pub use handler::{
    IdempotencyCleanupJob, IdempotencyHandler, IdempotencyMetrics, IdempotentOutcome,
    MetricsSnapshot,
};
pub use storage::{IdempotencyCache, IdempotencyEntry};
