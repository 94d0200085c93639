pub mod fault;
pub mod rate_limiter;
pub mod retry;

pub use fault::{FaultInjector, NoFaults, RandomFaults, ScriptedFaults};
pub use rate_limiter::RateLimiter;
pub use retry::{
    Classifier, RetryExecutor, RetryPolicy, RetryStats, RetryStatsSnapshot,
    DEFAULT_RETRYABLE_CODES, JITTER_FACTOR,
};
