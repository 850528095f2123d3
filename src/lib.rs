// platecache - caching, prefetching and chunked meal sorting core
// Author: kelexine (https://github.com/kelexine)

pub mod batching;
pub mod cache;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod meals;
pub mod metrics;
pub mod prefetch;
pub mod utils;
