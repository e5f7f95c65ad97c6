//! Execution isolation: resolved per-group policies and the bulkheads that
//! enforce them.

mod bulkhead;
pub mod policy;

pub use bulkhead::{Bulkhead, BulkheadPermit, SpawnError};
pub use policy::{
    DEFAULT_MAX_SEMAPHORES, DEFAULT_THREAD_POOL_SIZE, DEFAULT_TIMEOUT, IsolationPolicy,
    IsolationPolicyOverride, IsolationSettings, IsolationStrategy,
};
