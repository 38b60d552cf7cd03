// Gateway events outside of messages, and the background pollers.

pub mod guild_events;
pub mod pollers;
