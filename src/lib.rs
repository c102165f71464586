// lib.rs - Trigger-based chat command layer
// Commands match prefixed text, capture arguments, and reply through the
// senders registered on the dispatcher. Scraper commands render remote HTML
// pages and JSON APIs through selector templates.

pub mod bot;        // Dispatcher
pub mod commands;   // Command type and the built-in command families
pub mod config;     // botconfig.txt and scraper definitions
pub mod document;   // HTML and JSON selector sources
pub mod error;      // BotError
pub mod fetch;      // Remote document fetching
pub mod service;    // Conversation, message and sender types
pub mod storage;    // Scoped values and admin lists
pub mod template;   // Selector/template rendering
pub mod token;      // Request token derivation

pub use bot::Bot;
pub use error::{BotError, Result};
