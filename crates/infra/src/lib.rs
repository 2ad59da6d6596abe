//! Infrastructure layer: stores, keyed locking, the order/stock consistency
//! engine, and fire-and-forget background jobs.

pub mod catalog;
pub mod engine;
pub mod jobs;
pub mod locks;
pub mod stores;
pub mod summary;
