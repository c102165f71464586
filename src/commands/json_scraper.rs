// json_scraper.rs - Commands that turn JSON API responses into messages
// Rows are requested in order. Each response yields title/body fields from the
// configured captures; replies are either grouped into one message or sent
// one per field with a pause between sends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{build_url, request_rows, Captures, Command, Handler, Invocation, URL_BUILD_ERROR};
use crate::document::JsonDocument;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::service::{Message, MessageField};
use crate::template::{has_placeholder, FieldCapture};
use crate::token::TokenMaker;

/// Title and body of one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JsonCapture {
    pub title: FieldCapture,
    pub body: FieldCapture,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JsonScraperConfig {
    pub trigger: String,
    pub capture: String,
    /// Title of a grouped message.
    pub title: FieldCapture,
    pub captures: Vec<JsonCapture>,
    #[serde(rename = "URL")]
    pub url: String,
    pub help: String,
    pub help_input: String,
    /// Description of a grouped message.
    pub description: String,
    pub grouped: bool,
    /// Seconds between messages when not grouped.
    pub delay: u64,
    pub token: TokenMaker,
}

impl JsonScraperConfig {
    pub fn into_command(self, fetcher: Arc<dyn Fetcher>) -> Result<Command> {
        let trigger = self.trigger.clone();
        let capture = self.capture.clone();
        let help_input = self.help_input.clone();
        let help = self.help.clone();
        let handler = JsonScraper {
            config: self,
            fetcher,
        };
        Ok(Command::new(trigger, &capture, handler)?.with_help(help_input, help))
    }
}

pub struct JsonScraper {
    config: JsonScraperConfig,
    fetcher: Arc<dyn Fetcher>,
}

fn error_field(url: &str, value: String) -> MessageField {
    MessageField::new("Error", value).with_url(url)
}

impl JsonScraper {
    /// Fields for one row. The parsed document is returned too, so a grouped
    /// reply can take its title from the first response.
    async fn scrape_row(&self, row: &[String]) -> (Vec<MessageField>, Option<JsonDocument>) {
        let mut url = build_url(&self.config.url, row);
        url.push_str(&self.config.token.make_token(&row.concat()));

        let fetched = match self.fetcher.fetch(&url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!("[JSON] Fetching {} failed: {}", url, e);
                let value = format!("An error occurred retrieving {}.", url);
                return (vec![error_field(&url, value)], None);
            }
        };

        let doc = match JsonDocument::parse(&fetched.body) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("[JSON] Processing {} failed: {}", url, e);
                let value = format!("An error occurred processing the response from {}.", url);
                return (vec![error_field(&url, value)], None);
            }
        };
        if doc.is_empty() {
            return (vec![error_field(&url, format!("Nothing found at {}.", fetched.url))], None);
        }

        let fields = self
            .config
            .captures
            .iter()
            .filter_map(|capture| {
                let body = capture.body.render_with_map(&doc);
                if has_placeholder(&body) {
                    return None;
                }
                Some(MessageField::new(capture.title.render_with_map(&doc), body))
            })
            .collect();
        (fields, Some(doc))
    }
}

#[async_trait]
impl Handler for JsonScraper {
    async fn handle(&self, invocation: &Invocation<'_>, captures: &Captures) {
        let rows = match request_rows(&self.config.url, captures) {
            Some(rows) => rows,
            None => {
                invocation.reply_text(URL_BUILD_ERROR);
                return;
            }
        };

        let mut fields = Vec::new();
        let mut title = None;
        for row in &rows {
            let (row_fields, doc) = self.scrape_row(row).await;
            if title.is_none() {
                title = doc.map(|doc| self.config.title.render_with_map(&doc));
            }
            fields.extend(row_fields);
        }
        debug!("[JSON] '{}' rendered {} field(s)", self.config.trigger, fields.len());

        if self.config.grouped {
            invocation.reply(Message {
                title: title.unwrap_or_else(|| self.config.title.template.clone()),
                description: self.config.description.clone(),
                fields,
                ..Default::default()
            });
            return;
        }

        let delay = Duration::from_secs(self.config.delay);
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            invocation.reply(Message {
                title: field.field,
                description: field.value,
                url: field.url,
                ..Default::default()
            });
        }
    }
}
