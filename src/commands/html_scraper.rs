// html_scraper.rs - Commands that scrape values out of HTML pages
// Each capture row becomes one request; every row contributes one field to a
// single grouped reply, whether the request worked or not.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{build_url, request_rows, Captures, Command, Handler, Invocation, URL_BUILD_ERROR};
use crate::document::HtmlDocument;
use crate::error::Result;
use crate::fetch::{Fetched, Fetcher};
use crate::service::{Message, MessageField};
use crate::template::SelectorCapture;
use crate::token::TokenMaker;

pub const FETCH_ERROR: &str = "An error occurred retrieving the webpage.";

/// Declarative description of an HTML scraper, as stored in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HtmlScraperConfig {
    /// Title of the reply message.
    pub title: String,
    pub trigger: String,
    /// Pattern applied to the text after the trigger.
    pub capture: String,
    pub title_selector: SelectorCapture,
    /// Page to scrape. Each "%s" takes the next capture of a row.
    #[serde(rename = "URL")]
    pub url: String,
    pub reply_selector: SelectorCapture,
    pub help: String,
    pub help_input: String,
    pub token: TokenMaker,
}

impl HtmlScraperConfig {
    pub fn into_command(self, fetcher: Arc<dyn Fetcher>) -> Result<Command> {
        let trigger = self.trigger.clone();
        let capture = self.capture.clone();
        let help_input = self.help_input.clone();
        let help = self.help.clone();
        let handler = HtmlScraper {
            config: self,
            fetcher,
        };
        Ok(Command::new(trigger, &capture, handler)?.with_help(help_input, help))
    }
}

pub struct HtmlScraper {
    config: HtmlScraperConfig,
    fetcher: Arc<dyn Fetcher>,
}

impl HtmlScraper {
    async fn scrape_row(&self, row: &[String]) -> MessageField {
        let mut url = build_url(&self.config.url, row);
        url.push_str(&self.config.token.make_token(&row.concat()));

        match self.fetcher.fetch(&url).await {
            Ok(fetched) => self.render_page(&url, &fetched),
            Err(e) => {
                warn!("[HTML] Fetching {} failed: {}", url, e);
                MessageField::new("Error", FETCH_ERROR).with_url(url)
            }
        }
    }

    fn render_page(&self, url: &str, fetched: &Fetched) -> MessageField {
        let doc = HtmlDocument::parse(&fetched.body);
        if doc.is_empty() {
            return MessageField::new(url, format!("Webpage not found at {}", fetched.url));
        }
        MessageField::new(
            self.config.title_selector.render(&doc),
            self.config.reply_selector.render(&doc),
        )
        .with_url(fetched.url.as_str())
    }
}

#[async_trait]
impl Handler for HtmlScraper {
    async fn handle(&self, invocation: &Invocation<'_>, captures: &Captures) {
        let rows = match request_rows(&self.config.url, captures) {
            Some(rows) => rows,
            None => {
                invocation.reply_text(URL_BUILD_ERROR);
                return;
            }
        };

        let mut fields = Vec::with_capacity(rows.len());
        for row in &rows {
            fields.push(self.scrape_row(row).await);
        }
        debug!("[HTML] '{}' rendered {} field(s)", self.config.trigger, fields.len());

        invocation.reply(Message {
            title: self.config.title.clone(),
            fields,
            ..Default::default()
        });
    }
}
