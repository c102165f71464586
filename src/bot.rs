// bot.rs - Dispatcher that matches messages against registered commands
// Resolves the guild prefix and the sender's admin flag, fires every command
// whose trigger matches, and routes replies to senders by service id.

use std::sync::Arc;

use log::{debug, warn};

use crate::commands::{Command, Invocation};
use crate::service::{Conversation, Message, MessageSink, Sender, User};
use crate::storage::{Storage, PREFIX_KEY};

pub const DEFAULT_PREFIX: &str = "!";

pub struct Bot {
    commands: Vec<Command>,
    senders: Vec<Arc<dyn Sender>>,
    storage: Arc<dyn Storage>,
    default_prefix: String,
}

/// Delivers to every sender registered for the conversation's service.
struct Route<'a> {
    senders: &'a [Arc<dyn Sender>],
}

impl MessageSink for Route<'_> {
    fn send(&self, conversation: &Conversation, message: Message) {
        let mut delivered = false;
        for sender in self
            .senders
            .iter()
            .filter(|sender| sender.id() == conversation.service_id)
        {
            sender.send_message(conversation, message.clone());
            delivered = true;
        }
        if !delivered {
            warn!("[BOT] No sender registered for service '{}'", conversation.service_id);
        }
    }
}

impl Bot {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            commands: Vec::new(),
            senders: Vec::new(),
            storage,
            default_prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn add_command(&mut self, command: Command) {
        debug!("[BOT] Registered command '{}'", command.trigger);
        self.commands.push(command);
    }

    pub fn add_commands(&mut self, commands: impl IntoIterator<Item = Command>) {
        for command in commands {
            self.add_command(command);
        }
    }

    pub fn add_sender(&mut self, sender: Arc<dyn Sender>) {
        self.senders.push(sender);
    }

    pub fn set_default_prefix(&mut self, prefix: impl Into<String>) {
        self.default_prefix = prefix.into();
    }

    pub fn default_prefix(&self) -> &str {
        &self.default_prefix
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Prefix for a conversation's guild: the stored override or the default.
    pub fn prefix_for(&self, conversation: &Conversation) -> String {
        self.storage
            .get_guild_value(&conversation.guild(), PREFIX_KEY)
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_else(|| self.default_prefix.clone())
    }

    /// Handle one incoming message. Matching commands run one after another
    /// in registration order.
    pub async fn on_message(&self, mut conversation: Conversation, user: &User, text: &str) {
        let prefix = self.prefix_for(&conversation);
        if !text.starts_with(prefix.as_str()) {
            return;
        }
        conversation.admin =
            conversation.admin || self.storage.is_admin(&conversation.guild(), &user.id);

        let sink = Route {
            senders: &self.senders,
        };
        let invocation = Invocation {
            conversation: &conversation,
            user,
            storage: self.storage.as_ref(),
            sink: &sink,
            prefix: &prefix,
            commands: &self.commands,
        };

        for command in &self.commands {
            if let Some(content) = command.strip_trigger(&prefix, text) {
                debug!(
                    "[BOT] {} ({}) fired '{}' in {}/{}",
                    user.name,
                    user.id,
                    command.trigger,
                    conversation.service_id,
                    conversation.conversation_id
                );
                command.exec(&invocation, content).await;
            }
        }
    }
}
