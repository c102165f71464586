// storage.rs - Scoped key-value state
// Values live under a namespace: a guild, or a user within a service.
// Each guild also carries an admin list stored under ADMIN_KEY.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use log::{debug, info};

use crate::error::{BotError, Result};
use crate::service::Guild;

pub const ADMIN_KEY: &str = "Admin";
pub const PREFIX_KEY: &str = "prefix";

/// A stored value. Lookups that need text go through `as_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
}

impl Value {
    /// Render the value as text. Lists are joined with ", ".
    pub fn as_text(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::List(items) => items.join(", "),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    Guild(Guild),
    User { service_id: String, user_id: String },
}

impl Namespace {
    pub fn user(service_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Namespace::User {
            service_id: service_id.into(),
            user_id: user_id.into(),
        }
    }
}

impl From<&Guild> for Namespace {
    fn from(guild: &Guild) -> Self {
        Namespace::Guild(guild.clone())
    }
}

/// Scoped state consulted by commands. Implementations must make each admin
/// list update atomic with respect to concurrent callers.
pub trait Storage: Send + Sync {
    /// `None` when nothing was ever set for this exact namespace and key.
    fn get(&self, namespace: &Namespace, key: &str) -> Option<Value>;

    /// Last write wins.
    fn set(&self, namespace: &Namespace, key: &str, value: Value);

    fn is_admin(&self, guild: &Guild, id: &str) -> bool;

    /// Add `id` to the guild's admin list unless already present.
    fn set_admin(&self, guild: &Guild, id: &str) -> Result<()>;

    /// Remove `id` from the guild's admin list. Removing a non-member is a
    /// no-op. Returns whether `id` was a member.
    fn unset_admin(&self, guild: &Guild, id: &str) -> Result<bool>;

    fn get_guild_value(&self, guild: &Guild, key: &str) -> Option<Value> {
        self.get(&Namespace::from(guild), key)
    }

    fn set_guild_value(&self, guild: &Guild, key: &str, value: Value) {
        self.set(&Namespace::from(guild), key, value)
    }

    fn get_user_value(&self, service_id: &str, user_id: &str, key: &str) -> Option<Value> {
        self.get(&Namespace::user(service_id, user_id), key)
    }

    fn set_user_value(&self, service_id: &str, user_id: &str, key: &str, value: Value) {
        self.set(&Namespace::user(service_id, user_id), key, value)
    }
}

type Scope = Arc<Mutex<HashMap<String, Value>>>;

/// Memory-resident storage. Data is lost when the process exits.
///
/// The outer lock only guards the namespace table; each namespace has its
/// own mutex so unrelated guilds never wait on each other.
#[derive(Debug, Default)]
pub struct TempStorage {
    scopes: RwLock<HashMap<Namespace, Scope>>,
}

impl TempStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing_scope(&self, namespace: &Namespace) -> Option<Scope> {
        let scopes = self.scopes.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        scopes.get(namespace).cloned()
    }

    fn scope(&self, namespace: &Namespace) -> Scope {
        if let Some(scope) = self.existing_scope(namespace) {
            return scope;
        }
        let mut scopes = self.scopes.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        scopes.entry(namespace.clone()).or_default().clone()
    }

    fn with_scope<T>(
        &self,
        namespace: &Namespace,
        f: impl FnOnce(&mut HashMap<String, Value>) -> T,
    ) -> T {
        let scope = self.scope(namespace);
        let mut values = scope.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut values)
    }
}

fn admin_list(value: Option<&Value>) -> Result<Vec<String>> {
    match value {
        None => Ok(Vec::new()),
        Some(Value::List(ids)) => Ok(ids.clone()),
        Some(other) => Err(BotError::InvalidState {
            key: ADMIN_KEY.to_string(),
            found: format!("{:?}", other),
        }),
    }
}

impl Storage for TempStorage {
    fn get(&self, namespace: &Namespace, key: &str) -> Option<Value> {
        let scope = self.existing_scope(namespace)?;
        let values = scope.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, namespace: &Namespace, key: &str, value: Value) {
        debug!("[STORAGE] set {:?} {} = {:?}", namespace, key, value);
        self.with_scope(namespace, |values| {
            values.insert(key.to_string(), value);
        });
    }

    fn is_admin(&self, guild: &Guild, id: &str) -> bool {
        match self.get_guild_value(guild, ADMIN_KEY) {
            Some(Value::List(ids)) => ids.iter().any(|admin| admin == id),
            _ => false,
        }
    }

    fn set_admin(&self, guild: &Guild, id: &str) -> Result<()> {
        self.with_scope(&Namespace::from(guild), |values| {
            let mut ids = admin_list(values.get(ADMIN_KEY))?;
            if !ids.iter().any(|admin| admin == id) {
                ids.push(id.to_string());
                info!(
                    "[STORAGE] {} is now an admin of {}/{}",
                    id, guild.service_id, guild.guild_id
                );
            }
            values.insert(ADMIN_KEY.to_string(), Value::List(ids));
            Ok(())
        })
    }

    fn unset_admin(&self, guild: &Guild, id: &str) -> Result<bool> {
        self.with_scope(&Namespace::from(guild), |values| {
            let mut ids = admin_list(values.get(ADMIN_KEY))?;
            let before = ids.len();
            ids.retain(|admin| admin != id);
            let removed = ids.len() < before;
            if removed {
                info!(
                    "[STORAGE] {} is no longer an admin of {}/{}",
                    id, guild.service_id, guild.guild_id
                );
            }
            values.insert(ADMIN_KEY.to_string(), Value::List(ids));
            Ok(removed)
        })
    }
}
