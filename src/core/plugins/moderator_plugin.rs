// Moderator plugin - mutes, blacklisted channels and the content filters.
//
// Runs before every other plugin. Filtered messages are deleted and reported
// to the guild's log channel.

use super::plugin_models::*;
use super::plugin_router::CommandCatalog;
use crate::core::moderation::{FilterReason, FilterToggles, ModerationService};
use crate::core::stats::{BotStats, Stat};
use crate::core::store::ServerHandler;
use crate::core::util::make_dots;
use async_trait::async_trait;
use std::sync::Arc;

const LOG_CONTENT_MAX: usize = 200;
const LOG_COLOR: u32 = 0xE74C3C;

pub struct ModeratorPlugin {
    handler: Arc<ServerHandler>,
    moderation: Arc<ModerationService>,
    stats: Arc<BotStats>,
    catalog: Arc<CommandCatalog>,
}

impl ModeratorPlugin {
    pub fn new(
        handler: Arc<ServerHandler>,
        moderation: Arc<ModerationService>,
        stats: Arc<BotStats>,
        catalog: Arc<CommandCatalog>,
    ) -> Self {
        Self {
            handler,
            moderation,
            stats,
            catalog,
        }
    }

    fn log_embed(event: &MessageEvent, reason: FilterReason) -> EmbedSpec {
        EmbedSpec::new(format!("Message deleted ({})", reason))
            .description(make_dots(&event.content, LOG_CONTENT_MAX))
            .author(
                format!("{} ({})", event.author.name, event.author.id),
                event.author.avatar_url.clone(),
            )
            .field("Channel", format!("<#{}>", event.channel_id), true)
            .color(LOG_COLOR)
    }
}

#[async_trait]
impl Plugin for ModeratorPlugin {
    fn name(&self) -> &'static str {
        "moderator"
    }

    fn priority(&self) -> u8 {
        6
    }

    fn commands(&self) -> &'static [CommandSpec] {
        &[]
    }

    async fn on_message(
        &self,
        ctx: &PluginContext<'_>,
        out: &mut Outbox,
    ) -> Result<Flow, PluginError> {
        let event = ctx.event;
        let Some(guild) = &event.guild else {
            return Ok(Flow::Stop);
        };
        let guild_id = guild.id();

        if self.handler.is_muted(guild_id, event.author.id).await? {
            out.push(Action::DeleteMessage {
                channel_id: event.channel_id,
                message_id: event.message_id,
            });
            self.stats.add(Stat::Suppressed);
            return Ok(Flow::Stop);
        }

        if self.handler.is_blacklisted(guild_id, event.channel_id).await? {
            return Ok(Flow::Stop);
        }

        if self.catalog.is_known_command(&event.content, ctx.prefix) {
            return Ok(Flow::Continue);
        }

        let settings = self.handler.get_settings(guild_id).await?;
        let toggles = FilterToggles {
            spam: settings.spam_filter,
            words: settings.word_filter,
            invites: settings.invite_filter,
        };
        if !toggles.any() {
            return Ok(Flow::Continue);
        }

        let is_admin =
            self.handler
                .can_use_admin_commands(event.author.id, &event.author.roles, &guild.info);
        let Some(reason) = self.moderation.check_message(&event.content, toggles, is_admin) else {
            return Ok(Flow::Continue);
        };

        tracing::debug!(guild_id, user_id = event.author.id, %reason, "Message filtered");
        out.push(Action::DeleteMessage {
            channel_id: event.channel_id,
            message_id: event.message_id,
        });

        match settings.log_channel {
            Some(log_channel) if log_channel != event.channel_id => {
                out.push(Action::SendEmbed {
                    channel_id: log_channel,
                    embed: Self::log_embed(event, reason),
                });
            }
            _ => {}
        }

        Ok(Flow::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::moderation_service::tests::test_model;
    use crate::core::moderation::WordFilter;
    use crate::core::plugins::plugin_models::tests::{event, member, GUILD_ID};
    use crate::core::store::ModSetting;
    use crate::infra::store::InMemoryKvStore;

    static ADMIN_COMMANDS: &[CommandSpec] = &[CommandSpec::new("_kick", "Kick")];

    struct Setup {
        handler: Arc<ServerHandler>,
        stats: Arc<BotStats>,
        plugin: ModeratorPlugin,
    }

    async fn setup() -> Setup {
        let handler = Arc::new(ServerHandler::new(
            Arc::new(InMemoryKvStore::new()),
            0,
            "!",
        ));
        handler
            .server_setup(&crate::core::plugins::plugin_models::tests::guild().info)
            .await
            .unwrap();

        let moderation = Arc::new(ModerationService::new(
            WordFilter::new(["darn"]),
            Some(test_model()),
        ));
        let stats = Arc::new(BotStats::new());
        let catalog = Arc::new(CommandCatalog::new(vec![("admin", ADMIN_COMMANDS)]));
        let plugin = ModeratorPlugin::new(handler.clone(), moderation, stats.clone(), catalog);

        Setup {
            handler,
            stats,
            plugin,
        }
    }

    async fn run(plugin: &ModeratorPlugin, event: &MessageEvent) -> (Flow, Outbox) {
        let ctx = PluginContext {
            event,
            prefix: "!",
            lang: "en",
        };
        let mut out = Outbox::new(event.channel_id);
        let flow = plugin.on_message(&ctx, &mut out).await.unwrap();
        (flow, out)
    }

    #[tokio::test]
    async fn test_muted_messages_are_deleted() {
        let s = setup().await;
        s.handler.mute(GUILD_ID, 3).await.unwrap();

        let (flow, out) = run(&s.plugin, &event(member(3, "bob", &[]), "hello")).await;

        assert_eq!(flow, Flow::Stop);
        assert!(matches!(out.actions()[0], Action::DeleteMessage { message_id: 555, .. }));
        assert_eq!(s.stats.get(Stat::Suppressed), 1);
    }

    #[tokio::test]
    async fn test_blacklisted_channel_stops_chain() {
        let s = setup().await;
        s.handler.add_channel_blacklist(GUILD_ID, 100).await.unwrap();

        let (flow, out) = run(&s.plugin, &event(member(3, "bob", &[]), "!kick bob")).await;
        assert_eq!(flow, Flow::Stop);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_swearing_is_deleted_and_logged() {
        let s = setup().await;
        s.handler
            .update_moderation_settings(GUILD_ID, "filter words", true)
            .await
            .unwrap();
        s.handler.set_log_channel(GUILD_ID, Some(101)).await.unwrap();

        let (flow, out) = run(&s.plugin, &event(member(3, "bob", &[]), "well DARN it")).await;

        assert_eq!(flow, Flow::Stop);
        assert_eq!(out.actions().len(), 2);
        match &out.actions()[1] {
            Action::SendEmbed { channel_id, embed } => {
                assert_eq!(*channel_id, 101);
                assert_eq!(embed.title, "Message deleted (swearing)");
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_log_in_log_channel_itself() {
        let s = setup().await;
        s.handler
            .update_moderation_settings(GUILD_ID, ModSetting::WordFilter.field(), true)
            .await
            .unwrap();
        s.handler.set_log_channel(GUILD_ID, Some(100)).await.unwrap();

        let (_, out) = run(&s.plugin, &event(member(3, "bob", &[]), "darn")).await;
        assert_eq!(out.actions().len(), 1);
    }

    #[tokio::test]
    async fn test_commands_skip_filters() {
        let s = setup().await;
        s.handler
            .update_moderation_settings(GUILD_ID, "wordfilter", true)
            .await
            .unwrap();

        let (flow, out) = run(&s.plugin, &event(member(3, "bob", &[]), "!kick darn")).await;
        assert_eq!(flow, Flow::Continue);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_admins_may_post_invites() {
        let s = setup().await;
        s.handler
            .update_moderation_settings(GUILD_ID, "invitefilter", true)
            .await
            .unwrap();

        let (flow, _) = run(
            &s.plugin,
            &event(member(2, "alice", &["Nano Admin"]), "join discord.gg/abc"),
        )
        .await;
        assert_eq!(flow, Flow::Continue);

        let (flow, _) = run(&s.plugin, &event(member(3, "bob", &[]), "join discord.gg/abc")).await;
        assert_eq!(flow, Flow::Stop);
    }

    #[tokio::test]
    async fn test_direct_messages_stop() {
        let s = setup().await;
        let mut dm = event(member(3, "bob", &[]), "hi");
        dm.guild = None;

        let (flow, out) = run(&s.plugin, &dm).await;
        assert_eq!(flow, Flow::Stop);
        assert!(out.is_empty());
    }
}
