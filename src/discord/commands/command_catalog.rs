// Discord slash commands.
// Message commands go through the plugin router instead.

use crate::discord::{Data, Error};

pub mod filters;

pub mod presence;

pub mod remind;

/// Every slash command registered with Discord.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![remind::remind(), filters::filters()]
}
