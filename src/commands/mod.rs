// commands/mod.rs - Command definition and capture extraction
// A Command pairs a trigger with an argument pattern and a handler. The
// dispatcher decides whether a message is meant for a command; the command
// turns the rest of the message into capture rows and hands them over.

pub mod admin;          // Admin list and prefix management
pub mod help;           // Generated command listing
pub mod html_scraper;   // Commands that scrape HTML pages
pub mod json_scraper;   // Commands that read JSON APIs

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use regex::Regex;

use crate::error::{BotError, Result};
use crate::service::{Conversation, Message, MessageSink, User};
use crate::storage::Storage;
use crate::template::{count_placeholders, fill_template};

pub const URL_BUILD_ERROR: &str = "An error occurred when building the url.";

/// Everything a handler may touch during one call.
pub struct Invocation<'a> {
    pub conversation: &'a Conversation,
    pub user: &'a User,
    pub storage: &'a dyn Storage,
    pub sink: &'a dyn MessageSink,
    /// Prefix in effect for this conversation's guild.
    pub prefix: &'a str,
    /// Commands registered with the dispatcher, in registration order.
    pub commands: &'a [Command],
}

impl Invocation<'_> {
    pub fn reply(&self, message: Message) {
        self.sink.send(self.conversation, message);
    }

    pub fn reply_text(&self, text: impl Into<String>) {
        self.reply(Message::text(text));
    }
}

/// One row per pattern match, holding that match's capture groups
/// (group 0 excluded). Unmatched optional groups are empty strings.
pub type Captures = [Vec<String>];

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, invocation: &Invocation<'_>, captures: &Captures);
}

/// First capture of the first row, trimmed, if it is non-empty.
pub fn first_capture(captures: &Captures) -> Option<&str> {
    captures
        .first()
        .and_then(|row| row.first())
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// Rows a scraper should request, or `None` when the URL template needs more
/// captures than the first row holds. A template without placeholders and no
/// rows still makes one request.
pub fn request_rows(url_template: &str, captures: &Captures) -> Option<Vec<Vec<String>>> {
    let needed = count_placeholders(url_template);
    match captures.first() {
        None if needed == 0 => Some(vec![Vec::new()]),
        Some(row) if row.len() >= needed => Some(captures.to_vec()),
        _ => None,
    }
}

/// Sub-delimiters that stay literal inside a path segment.
const PATH_SEGMENT_SAFE: [char; 6] = ['$', '&', '+', ':', '=', '@'];

/// Percent-encode `word` for use as one path segment. Unreserved characters
/// and `PATH_SEGMENT_SAFE` are kept; `/`, `?`, `;` and `,` are escaped.
pub fn escape_path_segment(word: &str) -> String {
    let mut escaped = String::with_capacity(word.len());
    let mut buf = [0; 4];
    for c in word.chars() {
        if PATH_SEGMENT_SAFE.contains(&c) {
            escaped.push(c);
        } else {
            escaped.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    escaped
}

/// Escape each capture and substitute it into the URL template left to right.
/// Captures beyond the template's placeholders are ignored.
pub fn build_url(url_template: &str, row: &[String]) -> String {
    let escaped: Vec<String> = row.iter().map(|word| escape_path_segment(word)).collect();
    fill_template(url_template, &escaped)
}

#[derive(Clone)]
pub struct Command {
    pub trigger: String,
    pub pattern: Regex,
    /// What the command does.
    pub help: String,
    /// Arguments following the trigger, as shown in help.
    pub help_input: String,
    handler: Arc<dyn Handler>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("trigger", &self.trigger)
            .field("pattern", &self.pattern.as_str())
            .field("help", &self.help)
            .finish()
    }
}

impl Command {
    /// Compile `pattern` and bind it to `handler`.
    pub fn new(
        trigger: impl Into<String>,
        pattern: &str,
        handler: impl Handler + 'static,
    ) -> Result<Self> {
        let trigger = trigger.into();
        let pattern = Regex::new(pattern).map_err(|source| BotError::InvalidPattern {
            trigger: trigger.clone(),
            source,
        })?;
        Ok(Self {
            trigger,
            pattern,
            help: String::new(),
            help_input: String::new(),
            handler: Arc::new(handler),
        })
    }

    pub fn with_help(mut self, help_input: impl Into<String>, help: impl Into<String>) -> Self {
        self.help_input = help_input.into();
        self.help = help.into();
        self
    }

    /// Text after `prefix` + trigger, trimmed, when `text` is addressed to this command.
    pub fn strip_trigger<'t>(&self, prefix: &str, text: &'t str) -> Option<&'t str> {
        text.strip_prefix(prefix)?
            .strip_prefix(self.trigger.as_str())
            .map(str::trim)
    }

    /// All non-overlapping matches of the pattern in `content`. Patterns
    /// without capture groups never produce rows. An empty match right where
    /// the previous match ended is ignored.
    pub fn captures(&self, content: &str) -> Vec<Vec<String>> {
        if self.pattern.captures_len() <= 1 {
            return Vec::new();
        }
        let mut rows = Vec::new();
        let mut last_end = None;
        for caps in self.pattern.captures_iter(content) {
            let whole = match caps.get(0) {
                Some(whole) => whole,
                None => continue,
            };
            if whole.start() == whole.end() && last_end == Some(whole.start()) {
                continue;
            }
            last_end = Some(whole.end());
            let row = (1..caps.len())
                .map(|i| caps.get(i).map_or("", |m| m.as_str()).to_string())
                .collect();
            rows.push(row);
        }
        rows
    }

    pub async fn exec(&self, invocation: &Invocation<'_>, content: &str) {
        let rows = self.captures(content);
        debug!("[COMMAND] '{}' fired with {} capture row(s)", self.trigger, rows.len());
        self.handler.handle(invocation, &rows).await;
    }

    /// One help line for this command.
    pub fn help_line(&self, prefix: &str) -> String {
        let usage = if self.help_input.is_empty() {
            format!("{}{}", prefix, self.trigger)
        } else {
            format!("{}{} {}", prefix, self.trigger, self.help_input)
        };
        if self.help.is_empty() {
            format!("`{}`", usage)
        } else {
            format!("`{}` - {}", usage, self.help)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Handler for Noop {
        async fn handle(&self, _invocation: &Invocation<'_>, _captures: &Captures) {}
    }

    fn command(trigger: &str, pattern: &str) -> Command {
        Command::new(trigger, pattern, Noop).unwrap()
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = Command::new("bad", "(unclosed", Noop).unwrap_err();
        assert!(matches!(err, BotError::InvalidPattern { ref trigger, .. } if trigger == "bad"));
    }

    #[test]
    fn test_strip_trigger() {
        let cmd = command("scrape", "(.*)");
        assert_eq!(cmd.strip_trigger("!", "!scrape  tables "), Some("tables"));
        assert_eq!(cmd.strip_trigger("!", "!scrape"), Some(""));
        assert_eq!(cmd.strip_trigger("!", "scrape tables"), None);
        assert_eq!(cmd.strip_trigger("", "scrape tables"), Some("tables"));
        assert_eq!(cmd.strip_trigger("!", "!other"), None);
    }

    #[test]
    fn test_captures_drop_group_zero() {
        let cmd = command("wiki", r"(\w+)");
        assert_eq!(
            cmd.captures("rust go"),
            vec![vec!["rust".to_string()], vec!["go".to_string()]]
        );
    }

    #[test]
    fn test_captures_keep_sub_groups_in_order() {
        let cmd = command("pair", r"(\w+)=(\w+)?");
        assert_eq!(
            cmd.captures("a=1 b="),
            vec![
                vec!["a".to_string(), "1".to_string()],
                vec!["b".to_string(), String::new()],
            ]
        );
    }

    #[test]
    fn test_pattern_without_groups_yields_no_rows() {
        let cmd = command("ping", r"\w+");
        assert!(cmd.captures("hello world").is_empty());
    }

    #[test]
    fn test_catch_all_yields_single_row() {
        let cmd = command("echo", "(.*)");
        assert_eq!(cmd.captures("hello world"), vec![vec!["hello world".to_string()]]);
        assert_eq!(cmd.captures(""), vec![vec![String::new()]]);
    }

    #[test]
    fn test_first_capture() {
        assert_eq!(first_capture(&[vec![" id ".to_string()]]), Some("id"));
        assert_eq!(first_capture(&[vec!["  ".to_string()]]), None);
        assert_eq!(first_capture(&[]), None);
    }

    #[test]
    fn test_build_url_escapes_and_ignores_extras() {
        let row = vec!["hello world".to_string(), "a/b".to_string(), "extra".to_string()];
        assert_eq!(build_url("https://x/%s/%s", &row), "https://x/hello%20world/a%2Fb");
        assert_eq!(build_url("https://x/static", &row), "https://x/static");
    }

    #[test]
    fn test_escape_path_segment_keeps_sub_delimiters() {
        assert_eq!(escape_path_segment("C++"), "C++");
        assert_eq!(escape_path_segment("k=v&n@h:$"), "k=v&n@h:$");
        assert_eq!(escape_path_segment("a;b,c?d/e"), "a%3Bb%2Cc%3Fd%2Fe");
        assert_eq!(escape_path_segment("caf\u{e9} 100%"), "caf%C3%A9%20100%25");
    }

    #[test]
    fn test_request_rows() {
        let rows = vec![vec!["a".to_string()], vec!["b".to_string()]];
        assert_eq!(request_rows("https://x/%s", &rows), Some(rows.clone()));
        assert_eq!(request_rows("https://x/%s/%s", &rows), None);
        assert_eq!(request_rows("https://x/%s", &[]), None);
        assert_eq!(request_rows("https://x/", &[]), Some(vec![Vec::new()]));
    }

    #[test]
    fn test_help_line() {
        let cmd = command("wiki", r"(\w+)").with_help("<term>", "Look up a term");
        assert_eq!(cmd.help_line("!"), "`!wiki <term>` - Look up a term");
        assert_eq!(command("ping", "").help_line("#"), "`#ping`");
    }
}
