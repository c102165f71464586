// service.rs - Identity and message types shared with chat-service adapters
// A service adapter translates its own events into these types and receives
// replies back through the Sender trait.

use std::collections::VecDeque;
use std::sync::Mutex;

/// A (service, guild) pair. Namespaces guild configuration and the admin list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Guild {
    pub service_id: String,
    pub guild_id: String,
}

impl Guild {
    pub fn new(service_id: impl Into<String>, guild_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            guild_id: guild_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub id: String,
}

impl User {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// Where a message came from and where replies go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Conversation {
    pub service_id: String,
    pub conversation_id: String,
    pub guild_id: String,
    /// Whether the sender may run admin-gated commands.
    pub admin: bool,
}

impl Conversation {
    pub fn guild(&self) -> Guild {
        Guild::new(self.service_id.clone(), self.guild_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageField {
    pub field: String,
    pub value: String,
    pub url: String,
}

impl MessageField {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            url: String::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// A structured reply. Adapters decide how to render it (embed, plain text...).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub title: String,
    pub description: String,
    pub url: String,
    pub fields: Vec<MessageField>,
}

impl Message {
    pub fn text(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }
}

/// Outbound side of a chat service. Fire and forget.
pub trait Sender: Send + Sync {
    /// Service id this sender delivers for.
    fn id(&self) -> &str;

    fn send_message(&self, conversation: &Conversation, message: Message);
}

/// Sink for a single handler call. The dispatcher routes it to its senders.
pub trait MessageSink: Send + Sync {
    fn send(&self, conversation: &Conversation, message: Message);
}

pub const DEMO_SERVICE_ID: &str = "Demo";

/// Sender that keeps every message it is given, oldest first.
#[derive(Debug)]
pub struct DemoSender {
    service_id: String,
    messages: Mutex<VecDeque<(Message, Conversation)>>,
}

impl DemoSender {
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            messages: Mutex::new(VecDeque::new()),
        }
    }

    /// Take the oldest message that has not been popped yet.
    pub fn pop_message(&self) -> Option<(Message, Conversation)> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<(Message, Conversation)>> {
        self.messages.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for DemoSender {
    fn default() -> Self {
        Self::new(DEMO_SERVICE_ID)
    }
}

impl Sender for DemoSender {
    fn id(&self) -> &str {
        &self.service_id
    }

    fn send_message(&self, conversation: &Conversation, message: Message) {
        self.lock().push_back((message, conversation.clone()));
    }
}
