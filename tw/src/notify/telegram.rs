//! Telegram Bot API notifier

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{Notifier, NotifyError, NotifyKind};
use crate::domain::TrackedItem;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
}

pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(api_base: &str, token: &str, chat_id: &str, timeout: Duration) -> Result<Self, NotifyError> {
        debug!(%chat_id, "TelegramNotifier::new: called");
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, kind: NotifyKind, item: &TrackedItem) -> Result<(), NotifyError> {
        debug!(?kind, id = item.id, "TelegramNotifier::notify: called");
        let message = SendMessage {
            chat_id: &self.chat_id,
            text: render(kind, item),
            parse_mode: "HTML",
        };
        let response = self.client.post(self.endpoint()).json(&message).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Message body in Telegram's HTML parse mode
pub(crate) fn render(kind: NotifyKind, item: &TrackedItem) -> String {
    let heading = match kind {
        NotifyKind::Added => "Torrent added",
        NotifyKind::Updated => "Torrent updated",
    };
    let title = if item.display_title.is_empty() {
        &item.display_name
    } else {
        &item.display_title
    };
    format!(
        "<b>{heading}</b>\nTitle: {}\nHash: <code>{}</code>\nUrl: {}",
        escape_html(title),
        item.remote_identity,
        escape_html(&item.source_url)
    )
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
