// Prefix-command messages: snapshot the message, route it through the
// plugins and carry out what they asked for.

pub mod executor;
pub mod snapshot;

pub use executor::{execute, handle_message};
pub use snapshot::message_event;
