//! Progress tracking, dashboard rollups and quiz authoring for an online
//! learning platform.
//!
//! The modules below `store` are pure: they take borrowed snapshots and
//! return plain records. `store`, `db` and `routes` are the collaborators
//! that load those snapshots and expose the results over HTTP.

pub mod analytics;
pub mod authoring;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod filter;
pub mod ledger;
pub mod models;
pub mod routes;
pub mod store;

pub use routes::{router, SharedStore};
