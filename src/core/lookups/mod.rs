// Core lookups module - comics, jokes and encyclopedia summaries.

pub mod lookup_service;

pub use lookup_service::*;
