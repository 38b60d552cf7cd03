// Core plugins module - message handling split into small command plugins.

pub mod admin_plugin;
pub mod commons_plugin;
pub mod developer_plugin;
pub mod fun_plugin;
pub mod help_plugin;
pub mod lookups_plugin;
pub mod moderator_plugin;
pub mod plugin_models;
pub mod plugin_router;
pub mod reminder_plugin;
pub mod server_plugin;
pub mod stats_plugin;
pub mod voting_plugin;

pub use admin_plugin::AdminPlugin;
pub use commons_plugin::CommonsPlugin;
pub use developer_plugin::DeveloperPlugin;
pub use fun_plugin::FunPlugin;
pub use help_plugin::HelpPlugin;
pub use lookups_plugin::LookupsPlugin;
pub use moderator_plugin::ModeratorPlugin;
pub use plugin_models::*;
pub use plugin_router::{CommandCatalog, PluginRouter, WAKE_COMMAND};
pub use reminder_plugin::ReminderPlugin;
pub use server_plugin::ServerPlugin;
pub use stats_plugin::StatsPlugin;
pub use voting_plugin::VotingPlugin;

use crate::core::lookups::{JokeProvider, WikiProvider, XkcdService};
use crate::core::moderation::ModerationService;
use crate::core::reminders::ReminderService;
use crate::core::softbans::SoftBanScheduler;
use crate::core::stats::BotStats;
use crate::core::store::ServerHandler;
use crate::core::voting::VoteService;
use std::sync::Arc;

/// Services the plugins are built from.
pub struct PluginServices {
    pub handler: Arc<ServerHandler>,
    pub moderation: Arc<ModerationService>,
    pub reminders: Arc<ReminderService>,
    pub votes: Arc<VoteService>,
    pub softbans: Arc<SoftBanScheduler>,
    pub xkcd: Arc<XkcdService>,
    pub jokes: Arc<dyn JokeProvider>,
    pub wiki: Arc<dyn WikiProvider>,
    pub stats: Arc<BotStats>,
    pub version: &'static str,
}

/// Build the router with every plugin registered.
///
/// Commons goes first so custom commands win over built-in ones; the
/// moderator runs before all of them through its priority.
pub fn build_router(services: PluginServices) -> PluginRouter {
    let PluginServices {
        handler,
        moderation,
        reminders,
        votes,
        softbans,
        xkcd,
        jokes,
        wiki,
        stats,
        version,
    } = services;

    let command_plugins: Vec<Arc<dyn Plugin>> = vec![
        Arc::new(CommonsPlugin::new(handler.clone(), stats.clone(), version)),
        Arc::new(AdminPlugin::new(handler.clone(), softbans, stats.clone())),
        Arc::new(ReminderPlugin::new(reminders.clone(), stats.clone())),
        Arc::new(VotingPlugin::new(handler.clone(), votes.clone(), stats.clone())),
        Arc::new(LookupsPlugin::new(xkcd, jokes, wiki, stats.clone())),
        Arc::new(StatsPlugin::new(stats.clone())),
        Arc::new(ServerPlugin::new(
            handler.clone(),
            reminders,
            votes,
            stats.clone(),
            version,
        )),
        Arc::new(FunPlugin::new(stats.clone())),
        Arc::new(DeveloperPlugin::new(handler.clone(), stats.clone())),
    ];

    let mut groups: Vec<_> = command_plugins
        .iter()
        .map(|p| (p.name(), p.commands()))
        .collect();
    groups.push(("help", HelpPlugin::commands_table()));
    let catalog = Arc::new(CommandCatalog::new(groups));

    let mut router = PluginRouter::new(handler.clone());
    router.register(Arc::new(ModeratorPlugin::new(
        handler,
        moderation,
        stats.clone(),
        catalog.clone(),
    )));
    for plugin in command_plugins {
        router.register(plugin);
    }
    router.register(Arc::new(HelpPlugin::new(catalog, stats)));
    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lookups::{Comic, ComicProvider, LookupError, WikiAnswer};
    use crate::core::moderation::WordFilter;
    use crate::core::plugins::plugin_models::tests::{event, member, sent};
    use crate::core::store::{PluginDataManager, GuildInfo};
    use crate::infra::store::InMemoryKvStore;
    use async_trait::async_trait;

    struct Offline;

    #[async_trait]
    impl ComicProvider for Offline {
        async fn latest(&self) -> Result<Comic, LookupError> {
            Err(LookupError::NotFound)
        }

        async fn by_number(&self, _num: u32) -> Result<Comic, LookupError> {
            Err(LookupError::NotFound)
        }
    }

    #[async_trait]
    impl JokeProvider for Offline {
        async fn random_joke(&self) -> Result<String, LookupError> {
            Err(LookupError::NotFound)
        }
    }

    #[async_trait]
    impl WikiProvider for Offline {
        async fn summary(&self, _term: &str) -> Result<WikiAnswer, LookupError> {
            Ok(WikiAnswer::NotFound)
        }
    }

    fn router() -> (Arc<ServerHandler>, PluginRouter) {
        let store = Arc::new(InMemoryKvStore::new());
        let handler = Arc::new(ServerHandler::new(store.clone(), 0, "!"));
        let offline = Arc::new(Offline);

        let router = build_router(PluginServices {
            handler: handler.clone(),
            moderation: Arc::new(ModerationService::new(
                WordFilter::new(["badword"]),
                None,
            )),
            reminders: Arc::new(ReminderService::new(PluginDataManager::new(
                store,
                "reminder",
            ))),
            votes: Arc::new(VoteService::new()),
            softbans: Arc::new(SoftBanScheduler::new()),
            xkcd: Arc::new(XkcdService::new(offline.clone())),
            jokes: offline.clone(),
            wiki: offline,
            stats: Arc::new(BotStats::new()),
            version: "test",
        });
        (handler, router)
    }

    #[test]
    fn test_plugin_order() {
        let (_, router) = router();
        let names = router.plugin_names();
        assert_eq!(names[0], "moderator");
        assert_eq!(names[1], "commons");
        assert_eq!(names.last(), Some(&"help"));
        assert_eq!(names.len(), 11);
    }

    #[tokio::test]
    async fn test_help_knows_every_plugin() {
        let (_, router) = router();
        let actions = router
            .dispatch(&event(member(3, "bob", &[]), "!help nano.serverreset"))
            .await
            .unwrap();
        let out = actions_to_outbox(actions);
        assert!(sent(&out)[0].starts_with("**nano.serverreset**"));
    }

    #[tokio::test]
    async fn test_custom_command_beats_builtin() {
        let (handler, router) = router();
        let info = GuildInfo {
            id: 10,
            name: "Test Server".to_string(),
            owner_id: 1,
        };
        handler.server_setup(&info).await.unwrap();
        handler.set_command(10, "!ping", "pong!").await.unwrap();

        let actions = router
            .dispatch(&event(member(3, "bob", &[]), "!ping"))
            .await
            .unwrap();
        assert_eq!(sent(&actions_to_outbox(actions)), vec!["pong!"]);
    }

    fn actions_to_outbox(actions: Vec<Action>) -> Outbox {
        let mut out = Outbox::new(100);
        for action in actions {
            out.push(action);
        }
        out
    }
}
