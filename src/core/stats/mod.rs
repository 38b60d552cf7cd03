// Core stats module - process-wide counters.

pub mod stats_service;

pub use stats_service::*;
