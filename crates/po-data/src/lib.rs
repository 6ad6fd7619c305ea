//! In-memory data store for alerts, resources, protocols, metrics and the
//! playbook, persisted as a single snapshot blob.

pub mod seed;
mod store;

pub use store::{DataSnapshot, DataStore, ExportBundle};
