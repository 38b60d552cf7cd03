// Core soft-ban module - temporary bans lifted by a poller.

pub mod softban_service;

pub use softban_service::*;
