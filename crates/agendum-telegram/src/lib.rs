use std::sync::Arc;
use std::time::Duration;

use agendum_core::Agent;
use agendum_schema::InboundMessage;
use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ParseMode};
use uuid::Uuid;

/// Characters Telegram requires escaping in MarkdownV2 text.
const MARKDOWN_SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if MARKDOWN_SPECIAL.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub struct TelegramAdapter;

impl TelegramAdapter {
    pub fn to_inbound(chat_id: i64, text: Option<&str>) -> InboundMessage {
        InboundMessage {
            trace_id: Uuid::new_v4(),
            chat_id,
            text: text.map(str::to_string),
            at: Utc::now(),
        }
    }
}

pub struct TelegramBot {
    token: String,
    agent: Arc<Agent>,
}

impl TelegramBot {
    pub fn new(token: impl Into<String>, agent: Arc<Agent>) -> Self {
        Self {
            token: token.into(),
            agent,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let bot = Bot::new(&self.token);
        let agent = self.agent;

        let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
            let agent = agent.clone();

            async move {
                let chat_id = msg.chat.id;
                let inbound = TelegramAdapter::to_inbound(chat_id.0, msg.text());

                let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

                let bot_task = bot.clone();
                tokio::spawn(async move {
                    // Keep the typing indicator alive while the agent works.
                    let typing_handle = tokio::spawn({
                        let bot = bot_task.clone();
                        async move {
                            loop {
                                tokio::time::sleep(Duration::from_secs(4)).await;
                                if bot
                                    .send_chat_action(chat_id, ChatAction::Typing)
                                    .await
                                    .is_err()
                                {
                                    break;
                                }
                            }
                        }
                    });

                    let outbound = agent.handle(&inbound).await;
                    typing_handle.abort();

                    send_markdown(&bot_task, chat_id, &outbound.text).await;
                });

                Ok::<(), teloxide::RequestError>(())
            }
        });

        tracing::info!("telegram bot starting");
        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}

/// Replies may contain markdown links (the consent URL) that must survive,
/// so the raw text goes out first; if Telegram rejects the entities the
/// fully escaped form is sent instead.
async fn send_markdown(bot: &Bot, chat_id: ChatId, text: &str) {
    let raw = bot
        .send_message(chat_id, text)
        .parse_mode(ParseMode::MarkdownV2)
        .await;
    if raw.is_ok() {
        return;
    }

    tracing::debug!(chat_id = chat_id.0, "markdown send rejected, escaping");
    if let Err(error) = bot
        .send_message(chat_id, escape_markdown(text))
        .parse_mode(ParseMode::MarkdownV2)
        .await
    {
        tracing::error!(chat_id = chat_id.0, %error, "failed to deliver reply");
    }
}
