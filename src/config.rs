// config.rs - Bot settings and scraper definitions
// Settings come from botconfig.txt (KEY=VALUE lines). Scrapers are JSON arrays
// in their own files, named by the HTML_SCRAPERS and JSON_SCRAPERS settings.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use log::{info, warn};
use serde::de::DeserializeOwned;

use crate::bot::DEFAULT_PREFIX;
use crate::commands::html_scraper::HtmlScraperConfig;
use crate::commands::json_scraper::JsonScraperConfig;
use crate::error::{BotError, Result};

pub const CONFIG_FILE: &str = "botconfig.txt";
pub const CONFIG_PATHS: [&str; 4] = [
    "botconfig.txt",
    "../botconfig.txt",
    "../../botconfig.txt",
    "src/botconfig.txt",
];
const TOKEN_PLACEHOLDER: &str = "YOUR_BOT_TOKEN_HERE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotSettings {
    pub discord_token: String,
    pub prefix: String,
    pub log_filter: String,
    pub html_scrapers: String,
    pub json_scrapers: String,
    /// Seconds before a fetch is abandoned.
    pub fetch_timeout: u64,
    pub user_agent: String,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            prefix: DEFAULT_PREFIX.to_string(),
            log_filter: "info".to_string(),
            html_scrapers: "html_scrapers.json".to_string(),
            json_scrapers: "json_scrapers.json".to_string(),
            fetch_timeout: 15,
            user_agent: concat!("boby_rust/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Parse KEY=VALUE lines. Blank lines and `#` comments are skipped, a leading
/// BOM is dropped, and later keys overwrite earlier ones.
pub fn parse_key_values(content: &str) -> HashMap<String, String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut values = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    values
}

impl BotSettings {
    pub fn from_key_values(values: &HashMap<String, String>) -> Result<Self> {
        let mut settings = Self::default();

        match values.get("DISCORD_TOKEN") {
            Some(token) if !token.is_empty() && token != TOKEN_PLACEHOLDER => {
                settings.discord_token = token.clone();
            }
            Some(_) => {
                return Err(BotError::Config(
                    "DISCORD_TOKEN is empty or still the placeholder".to_string(),
                ))
            }
            None => return Err(BotError::Config("DISCORD_TOKEN is missing".to_string())),
        }

        let text = |key: &str, slot: &mut String| {
            if let Some(value) = values.get(key).filter(|value| !value.is_empty()) {
                *slot = value.clone();
            }
        };
        text("PREFIX", &mut settings.prefix);
        text("RUST_LOG", &mut settings.log_filter);
        text("HTML_SCRAPERS", &mut settings.html_scrapers);
        text("JSON_SCRAPERS", &mut settings.json_scrapers);
        text("USER_AGENT", &mut settings.user_agent);

        if let Some(timeout) = values.get("FETCH_TIMEOUT") {
            settings.fetch_timeout = timeout.parse().map_err(|_| {
                BotError::Config(format!(
                    "FETCH_TIMEOUT must be a number of seconds, got '{}'",
                    timeout
                ))
            })?;
        }
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_key_values(&parse_key_values(&content))
    }

    /// Load the first botconfig.txt found in the usual places.
    pub fn load() -> Result<Self> {
        for path in CONFIG_PATHS {
            if Path::new(path).is_file() {
                let settings = Self::from_file(path)?;
                info!("[CONFIG] Settings loaded from {}", path);
                return Ok(settings);
            }
        }
        Err(BotError::Config(format!(
            "no {} found in any expected location (., .., ../.., src/)",
            CONFIG_FILE
        )))
    }
}

pub fn read_scrapers<T: DeserializeOwned>(reader: impl Read) -> Result<Vec<T>> {
    Ok(serde_json::from_reader(reader)?)
}

/// A missing file means no scrapers of that kind.
fn load_scrapers<T: DeserializeOwned>(path: impl AsRef<Path>, kind: &str) -> Result<Vec<T>> {
    let path = path.as_ref();
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("[CONFIG] No {} scraper file at {}, skipping", kind, path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    let scrapers: Vec<T> = read_scrapers(io::BufReader::new(file))?;
    info!("[CONFIG] Loaded {} {} scraper(s) from {}", scrapers.len(), kind, path.display());
    Ok(scrapers)
}

pub fn load_html_scrapers(path: impl AsRef<Path>) -> Result<Vec<HtmlScraperConfig>> {
    load_scrapers(path, "HTML")
}

pub fn load_json_scrapers(path: impl AsRef<Path>) -> Result<Vec<JsonScraperConfig>> {
    load_scrapers(path, "JSON")
}
