// help.rs - Lists every registered command

use async_trait::async_trait;

use super::{Captures, Handler, Invocation};
use crate::service::Message;

pub struct Help;

#[async_trait]
impl Handler for Help {
    async fn handle(&self, invocation: &Invocation<'_>, _captures: &Captures) {
        let lines: Vec<String> = invocation
            .commands
            .iter()
            .map(|command| command.help_line(invocation.prefix))
            .collect();
        invocation.reply(Message {
            title: "Commands".to_string(),
            description: lines.join("\n"),
            ..Default::default()
        });
    }
}
