// Update coalescing: batching and debouncing
// Author: kelexine (https://github.com/kelexine)

pub mod debounce;
pub mod updater;

pub use debounce::Debouncer;
pub use updater::{create_batch_updater, BatchUpdater};
