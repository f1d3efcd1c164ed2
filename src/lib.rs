//! Live AIS vessel dashboard for Saudi Arabian ports.
//!
//! Consumes position and static-data reports from a realtime channel,
//! reconciles them into one record per vessel, and keeps a map marker
//! layer plus port-proximity views in step with the evolving set.

pub mod bridge;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod geo;
pub mod map;
pub mod models;
pub mod reconciler;
pub mod store;
pub mod web;
