//! Integration tests for gallerysync-sync
//!
//! Runs the engine, detector and scheduler against an in-memory source, an
//! in-memory blob store and the SQLite checkpoint store.

mod common;

mod test_engine;
mod test_scheduler;
