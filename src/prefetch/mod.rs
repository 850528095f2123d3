// Prefetch module - deduplicated, prioritized fetching on top of the TTL cache
// Author: kelexine (https://github.com/kelexine)

pub mod admission;
pub mod manager;
pub mod models;

pub use admission::{AdmissionPermit, AdmissionQueue, AdmissionTicket};
pub use manager::{PrefetchFuture, PrefetchManager, SharedFetch};
pub use models::{BoxedFetcher, PendingInfo, PrefetchOptions, PrefetchRequest};
