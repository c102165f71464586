// admin.rs - Admin list and prefix management commands
// check-admin and im-admin are open to everyone. set-admin, unset-admin and
// set-prefix require the admin flag the dispatcher put on the conversation.

use async_trait::async_trait;
use log::{error, info, warn};

use super::{first_capture, Captures, Command, Handler, Invocation};
use crate::error::Result;
use crate::storage::{Value, PREFIX_KEY};

pub const DENIED: &str = "You need to be an admin to do that.";
pub const MISSING_ID: &str = "Please provide an id.";
pub const STORAGE_FAILURE: &str = "Could not update the admin list.";

/// Trigger strings for the built-in commands. Deployment configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminTriggers {
    pub check_admin: String,
    pub im_admin: String,
    pub set_admin: String,
    pub unset_admin: String,
    pub set_prefix: String,
}

impl Default for AdminTriggers {
    fn default() -> Self {
        Self {
            check_admin: "check-admin".to_string(),
            im_admin: "im-admin".to_string(),
            set_admin: "set-admin".to_string(),
            unset_admin: "unset-admin".to_string(),
            set_prefix: "set-prefix".to_string(),
        }
    }
}

/// What a gated command does for a caller without the admin flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Reply,
    Silent,
}

fn deny(invocation: &Invocation<'_>, denial: Denial, trigger: &str) {
    warn!(
        "[ADMIN] {} ({}) is not allowed to run '{}'",
        invocation.user.name, invocation.user.id, trigger
    );
    if denial == Denial::Reply {
        invocation.reply_text(DENIED);
    }
}

/// Reports whether the given id is an admin of this guild.
pub struct CheckAdmin;

#[async_trait]
impl Handler for CheckAdmin {
    async fn handle(&self, invocation: &Invocation<'_>, captures: &Captures) {
        let id = match first_capture(captures) {
            Some(id) => id,
            None => {
                invocation.reply_text("Please provide an id to check.");
                return;
            }
        };
        let guild = invocation.conversation.guild();
        if invocation.storage.is_admin(&guild, id) {
            invocation.reply_text(format!("{} is an admin.", id));
        } else {
            invocation.reply_text(format!("{} is not an admin.", id));
        }
    }
}

/// Reports whether the sender is an admin.
pub struct ImAdmin;

#[async_trait]
impl Handler for ImAdmin {
    async fn handle(&self, invocation: &Invocation<'_>, _captures: &Captures) {
        if invocation.conversation.admin {
            invocation.reply_text("You are an admin.");
        } else {
            invocation.reply_text("You are not an admin.");
        }
    }
}

pub struct SetAdmin {
    pub denial: Denial,
}

#[async_trait]
impl Handler for SetAdmin {
    async fn handle(&self, invocation: &Invocation<'_>, captures: &Captures) {
        if !invocation.conversation.admin {
            deny(invocation, self.denial, "set-admin");
            return;
        }
        let id = match first_capture(captures) {
            Some(id) => id,
            None => {
                invocation.reply_text(MISSING_ID);
                return;
            }
        };
        let guild = invocation.conversation.guild();
        match invocation.storage.set_admin(&guild, id) {
            Ok(()) => {
                info!("[ADMIN] {} set {} as admin", invocation.user.name, id);
                invocation.reply_text("Admin has been set.");
            }
            Err(e) => {
                error!("[ADMIN] Failed to set admin {}: {}", id, e);
                invocation.reply_text(STORAGE_FAILURE);
            }
        }
    }
}

pub struct UnsetAdmin {
    pub denial: Denial,
}

#[async_trait]
impl Handler for UnsetAdmin {
    async fn handle(&self, invocation: &Invocation<'_>, captures: &Captures) {
        if !invocation.conversation.admin {
            deny(invocation, self.denial, "unset-admin");
            return;
        }
        let id = match first_capture(captures) {
            Some(id) => id,
            None => {
                invocation.reply_text(MISSING_ID);
                return;
            }
        };
        let guild = invocation.conversation.guild();
        match invocation.storage.unset_admin(&guild, id) {
            Ok(_) => {
                info!("[ADMIN] {} unset {} as admin", invocation.user.name, id);
                invocation.reply_text("Admin has been unset.");
            }
            Err(e) => {
                error!("[ADMIN] Failed to unset admin {}: {}", id, e);
                invocation.reply_text(STORAGE_FAILURE);
            }
        }
    }
}

/// Stores a per-guild prefix that replaces the bot default.
pub struct SetPrefix {
    pub denial: Denial,
}

#[async_trait]
impl Handler for SetPrefix {
    async fn handle(&self, invocation: &Invocation<'_>, captures: &Captures) {
        if !invocation.conversation.admin {
            deny(invocation, self.denial, "set-prefix");
            return;
        }
        let prefix = match first_capture(captures) {
            Some(prefix) => prefix,
            None => {
                invocation.reply_text("Please provide a prefix.");
                return;
            }
        };
        let guild = invocation.conversation.guild();
        invocation
            .storage
            .set_guild_value(&guild, PREFIX_KEY, Value::from(prefix));
        info!("[ADMIN] Prefix for {}/{} set to '{}'", guild.service_id, guild.guild_id, prefix);
        invocation.reply_text(format!("Prefix has been set to {}.", prefix));
    }
}

/// The built-in admin command set.
pub fn commands(triggers: &AdminTriggers) -> Result<Vec<Command>> {
    Ok(vec![
        Command::new(triggers.check_admin.as_str(), "(.*)", CheckAdmin)?
            .with_help("<id>", "Check if someone is an admin."),
        Command::new(triggers.im_admin.as_str(), "(.*)", ImAdmin)?
            .with_help("", "Check if you are an admin."),
        Command::new(triggers.set_admin.as_str(), "(.*)", SetAdmin { denial: Denial::Reply })?
            .with_help("<id>", "Give someone every permission for this bot."),
        Command::new(triggers.unset_admin.as_str(), "(.*)", UnsetAdmin { denial: Denial::Reply })?
            .with_help("<id>", "Take admin permissions away from someone."),
        Command::new(triggers.set_prefix.as_str(), r"(\S+)", SetPrefix { denial: Denial::Silent })?
            .with_help("<prefix>", "Change what messages must start with for this server."),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{Conversation, Guild, Message, MessageSink, User};
    use crate::storage::{Storage, TempStorage};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Message>>);

    impl MessageSink for Collect {
        fn send(&self, _conversation: &Conversation, message: Message) {
            self.0.lock().unwrap().push(message);
        }
    }

    impl Collect {
        fn descriptions(&self) -> Vec<String> {
            self.0.lock().unwrap().iter().map(|m| m.description.clone()).collect()
        }
    }

    fn conversation(admin: bool) -> Conversation {
        Conversation {
            service_id: "Demo".to_string(),
            conversation_id: "0".to_string(),
            guild_id: "0".to_string(),
            admin,
        }
    }

    fn row(id: &str) -> Vec<Vec<String>> {
        vec![vec![id.to_string()]]
    }

    async fn run(
        handler: &dyn Handler,
        admin: bool,
        storage: &TempStorage,
        captures: &Captures,
    ) -> Vec<String> {
        let sink = Collect::default();
        let conversation = conversation(admin);
        let user = User::new("Test_User", "Demo");
        let invocation = Invocation {
            conversation: &conversation,
            user: &user,
            storage,
            sink: &sink,
            prefix: "",
            commands: &[],
        };
        handler.handle(&invocation, captures).await;
        sink.descriptions()
    }

    fn guild() -> Guild {
        Guild::new("Demo", "0")
    }

    #[tokio::test]
    async fn test_admin_can_set_and_unset() {
        let storage = TempStorage::new();
        let set = SetAdmin { denial: Denial::Reply };
        let unset = UnsetAdmin { denial: Denial::Reply };

        assert_eq!(run(&set, true, &storage, &row("U1")).await, vec!["Admin has been set."]);
        assert!(storage.is_admin(&guild(), "U1"));

        assert_eq!(run(&unset, true, &storage, &row("U1")).await, vec!["Admin has been unset."]);
        assert!(!storage.is_admin(&guild(), "U1"));
    }

    #[tokio::test]
    async fn test_non_admin_cannot_set_or_unset() {
        let storage = TempStorage::new();
        let replies = run(&SetAdmin { denial: Denial::Reply }, false, &storage, &row("U1")).await;
        assert_eq!(replies, vec![DENIED]);
        assert_eq!(storage.get_guild_value(&guild(), crate::storage::ADMIN_KEY), None);

        storage.set_admin(&guild(), "U1").unwrap();
        let unset = UnsetAdmin { denial: Denial::Silent };
        let replies = run(&unset, false, &storage, &row("U1")).await;
        assert!(replies.is_empty());
        assert!(storage.is_admin(&guild(), "U1"));
    }

    #[tokio::test]
    async fn test_missing_id_is_reported() {
        let storage = TempStorage::new();
        let replies = run(&SetAdmin { denial: Denial::Reply }, true, &storage, &[]).await;
        assert_eq!(replies, vec![MISSING_ID]);
        let replies = run(&UnsetAdmin { denial: Denial::Reply }, true, &storage, &row(" ")).await;
        assert_eq!(replies, vec![MISSING_ID]);
        let replies = run(&CheckAdmin, false, &storage, &[]).await;
        assert_eq!(replies, vec!["Please provide an id to check."]);
    }

    #[tokio::test]
    async fn test_check_admin_is_unrestricted() {
        let storage = TempStorage::new();
        let replies = run(&CheckAdmin, false, &storage, &row("U1")).await;
        assert_eq!(replies, vec!["U1 is not an admin."]);
        storage.set_admin(&guild(), "U1").unwrap();
        assert_eq!(run(&CheckAdmin, false, &storage, &row("U1")).await, vec!["U1 is an admin."]);
    }

    #[tokio::test]
    async fn test_im_admin_reads_conversation_flag() {
        let storage = TempStorage::new();
        assert_eq!(run(&ImAdmin, true, &storage, &[]).await, vec!["You are an admin."]);
        assert_eq!(run(&ImAdmin, false, &storage, &[]).await, vec!["You are not an admin."]);
    }

    #[tokio::test]
    async fn test_corrupted_admin_list_is_reported() {
        let storage = TempStorage::new();
        storage.set_guild_value(&guild(), crate::storage::ADMIN_KEY, Value::Bool(true));
        let replies = run(&SetAdmin { denial: Denial::Reply }, true, &storage, &row("U1")).await;
        assert_eq!(replies, vec![STORAGE_FAILURE]);
    }

    #[tokio::test]
    async fn test_set_prefix() {
        let storage = TempStorage::new();
        let handler = SetPrefix { denial: Denial::Silent };

        assert!(run(&handler, false, &storage, &row("#")).await.is_empty());
        assert_eq!(storage.get_guild_value(&guild(), PREFIX_KEY), None);

        let replies = run(&handler, true, &storage, &row("#")).await;
        assert_eq!(replies, vec!["Prefix has been set to #."]);
        assert_eq!(storage.get_guild_value(&guild(), PREFIX_KEY), Some(Value::from("#")));
    }

    #[test]
    fn test_builtin_commands_compile() {
        let commands = commands(&AdminTriggers::default()).unwrap();
        let triggers: Vec<&str> = commands.iter().map(|c| c.trigger.as_str()).collect();
        assert_eq!(
            triggers,
            vec!["check-admin", "im-admin", "set-admin", "unset-admin", "set-prefix"]
        );
    }
}
