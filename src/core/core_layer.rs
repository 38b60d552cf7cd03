// The core module contains all business logic.
// Nothing in here knows about Discord; each feature gets its own submodule.

#[path = "store/mod.rs"]
pub mod store;

#[path = "util/mod.rs"]
pub mod util;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "reminders/mod.rs"]
pub mod reminders;

#[path = "softbans/mod.rs"]
pub mod softbans;

#[path = "voting/mod.rs"]
pub mod voting;

#[path = "stats/mod.rs"]
pub mod stats;

#[path = "lookups/mod.rs"]
pub mod lookups;

#[path = "plugins/mod.rs"]
pub mod plugins;
