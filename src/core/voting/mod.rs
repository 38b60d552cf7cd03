// Core voting module - one running vote per guild.

pub mod vote_service;

pub use vote_service::*;
