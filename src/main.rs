// main.rs - Discord front end for the command layer
// Loads botconfig.txt and the scraper files, connects to Discord through
// serenity, and feeds every guild or DM message to the dispatcher.

use std::sync::Arc;

use boby_rust::commands::admin::{self, AdminTriggers};
use boby_rust::commands::help::Help;
use boby_rust::commands::Command;
use boby_rust::config::{load_html_scrapers, load_json_scrapers, BotSettings};
use boby_rust::fetch::{Fetcher, HttpFetcher};
use boby_rust::service::{Conversation, Message, Sender, User};
use boby_rust::storage::TempStorage;
use boby_rust::{Bot, Result};
use log::{error, info, warn};
use serenity::{
    async_trait,
    client::{Client, Context, EventHandler},
    http::Http,
    model::{channel::Message as DiscordMessage, gateway::Ready, id::ChannelId},
    prelude::GatewayIntents,
};
use tokio::signal;
use tokio::sync::mpsc;

const SERVICE_ID: &str = "Discord";
const DM_GUILD_ID: &str = "dm";
// Discord rejects empty embed field names and values
const BLANK: &str = "\u{200b}";

type Outgoing = (Conversation, Message);

/// Queues replies for the delivery task; handlers never wait on Discord.
struct DiscordSender {
    queue: mpsc::UnboundedSender<Outgoing>,
}

impl Sender for DiscordSender {
    fn id(&self) -> &str {
        SERVICE_ID
    }

    fn send_message(&self, conversation: &Conversation, message: Message) {
        if self.queue.send((conversation.clone(), message)).is_err() {
            error!("[DISCORD] Delivery task has stopped, dropping reply");
        }
    }
}

fn or_blank(text: &str) -> &str {
    if text.trim().is_empty() {
        BLANK
    } else {
        text
    }
}

async fn deliver(http: &Arc<Http>, conversation: &Conversation, message: &Message) {
    let channel = match conversation.conversation_id.parse::<u64>() {
        Ok(id) => ChannelId(id),
        Err(_) => {
            warn!("[DISCORD] '{}' is not a channel id", conversation.conversation_id);
            return;
        }
    };
    let result = channel
        .send_message(http, |m| {
            m.embed(|e| {
                if !message.title.is_empty() {
                    e.title(&message.title);
                }
                if !message.description.is_empty() {
                    e.description(&message.description);
                }
                if message.url.starts_with("http") {
                    e.url(&message.url);
                }
                for field in &message.fields {
                    let value = if field.url.starts_with("http") {
                        format!("{}\n{}", field.value, field.url)
                    } else {
                        field.value.clone()
                    };
                    e.field(or_blank(&field.field), or_blank(&value), false);
                }
                e
            })
        })
        .await;
    if let Err(e) = result {
        error!("[DISCORD] Failed to send reply to channel {}: {:?}", channel, e);
    }
}

async fn run_delivery(http: Arc<Http>, mut queue: mpsc::UnboundedReceiver<Outgoing>) {
    while let Some((conversation, message)) = queue.recv().await {
        deliver(&http, &conversation, &message).await;
    }
}

struct Handler {
    bot: Arc<Bot>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _: Context, ready: Ready) {
        info!("[MAIN] Connected as {} to {} guild(s)", ready.user.name, ready.guilds.len());
    }

    async fn message(&self, ctx: Context, msg: DiscordMessage) {
        if msg.author.bot || msg.author.id == ctx.cache.current_user_id() {
            return;
        }
        let owner = msg
            .guild_id
            .and_then(|guild_id| guild_id.to_guild_cached(&ctx.cache))
            .map_or(false, |guild| guild.owner_id == msg.author.id);
        let conversation = Conversation {
            service_id: SERVICE_ID.to_string(),
            conversation_id: msg.channel_id.to_string(),
            guild_id: msg
                .guild_id
                .map_or_else(|| DM_GUILD_ID.to_string(), |id| id.to_string()),
            admin: owner,
        };
        let user = User::new(msg.author.name.clone(), msg.author.id.to_string());
        self.bot.on_message(conversation, &user, &msg.content).await;
    }
}

fn build_bot(settings: &BotSettings, fetcher: Arc<dyn Fetcher>) -> Result<Bot> {
    let mut bot = Bot::new(Arc::new(TempStorage::new()));
    bot.set_default_prefix(settings.prefix.as_str());
    bot.add_commands(admin::commands(&AdminTriggers::default())?);
    bot.add_command(Command::new("help", "", Help)?.with_help("", "List every command."));
    for scraper in load_html_scrapers(&settings.html_scrapers)? {
        bot.add_command(scraper.into_command(fetcher.clone())?);
    }
    for scraper in load_json_scrapers(&settings.json_scrapers)? {
        bot.add_command(scraper.into_command(fetcher.clone())?);
    }
    Ok(bot)
}

#[tokio::main]
async fn main() {
    let settings = BotSettings::load();
    let filter = settings
        .as_ref()
        .map_or_else(|_| "error".to_string(), |settings| settings.log_filter.clone());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_secs()
        .init();

    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            error!("[MAIN] Failed to load settings: {}", e);
            eprintln!("Create a botconfig.txt with DISCORD_TOKEN=your_token_here and PREFIX=!");
            return;
        }
    };

    let fetcher: Arc<dyn Fetcher> =
        match HttpFetcher::new(settings.fetch_timeout, &settings.user_agent) {
            Ok(fetcher) => Arc::new(fetcher),
            Err(e) => {
                error!("[MAIN] Failed to create HTTP client: {}", e);
                return;
            }
        };
    let mut bot = match build_bot(&settings, fetcher) {
        Ok(bot) => bot,
        Err(e) => {
            error!("[MAIN] Invalid command configuration: {}", e);
            return;
        }
    };

    let (queue, outgoing) = mpsc::unbounded_channel();
    bot.add_sender(Arc::new(DiscordSender { queue }));
    info!(
        "[MAIN] Starting with prefix '{}' and {} command(s)",
        bot.default_prefix(),
        bot.commands().len()
    );

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;
    let mut client = match Client::builder(&settings.discord_token, intents)
        .event_handler(Handler { bot: Arc::new(bot) })
        .await
    {
        Ok(client) => client,
        Err(e) => {
            error!("[MAIN] Error creating Discord client: {:?}", e);
            return;
        }
    };

    let delivery = tokio::spawn(run_delivery(client.cache_and_http.http.clone(), outgoing));

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("[MAIN] Received Ctrl+C, stopping");
        }
        result = client.start() => {
            if let Err(e) = result {
                error!("[MAIN] Client error: {:?}", e);
            }
        }
    }

    client.shard_manager.lock().await.shutdown_all().await;
    delivery.abort();
    info!("[MAIN] Bot stopped");
}
