//! Telegram Bot API transport.

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::{Notifier, NotifyError, NotifyFuture};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

/// Sends HTML-formatted messages to one chat.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String, proxy: Option<&str>) -> Result<Self, NotifyError> {
        // Long-poll requests hold the connection for 30s.
        let mut builder = Client::builder().timeout(Duration::from_secs(35));
        if let Some(url) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }

        Ok(Self {
            client: builder.build()?,
            api_base: DEFAULT_API_BASE.to_string(),
            bot_token,
            chat_id,
        })
    }

    /// Point at a different Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }
}

/// Request URLs carry the bot token; strip them before the error is logged.
fn redact(err: reqwest::Error) -> NotifyError {
    NotifyError::Http(err.without_url())
}

impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn send<'a>(&'a self, text: &'a str) -> NotifyFuture<'a> {
        Box::pin(async move {
            let payload = SendMessage {
                chat_id: &self.chat_id,
                text,
                parse_mode: "HTML",
                disable_web_page_preview: true,
            };

            let response = self
                .client
                .post(self.method_url("sendMessage"))
                .json(&payload)
                .send()
                .await
                .map_err(redact)?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(NotifyError::Api {
                    status: status.as_u16(),
                    body,
                });
            }

            debug!("Telegram message delivered ({} chars)", text.len());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url() {
        let tg = TelegramNotifier::new("123:abc".into(), "42".into(), None)
            .unwrap()
            .with_api_base("http://localhost:8081/");
        assert_eq!(tg.method_url("sendMessage"), "http://localhost:8081/bot123:abc/sendMessage");
        assert_eq!(tg.chat_id(), "42");
    }

    #[tokio::test]
    async fn test_send_error_hides_token() {
        // Nothing listens on port 1.
        let tg = TelegramNotifier::new("123456:SECRET_TOKEN".into(), "42".into(), None)
            .unwrap()
            .with_api_base("http://127.0.0.1:1");

        let err = tg.send("hello").await.unwrap_err();
        assert!(matches!(err, NotifyError::Http(_)));
        assert!(!err.to_string().contains("SECRET_TOKEN"), "{err}");
        assert!(!format!("{err:?}").contains("SECRET_TOKEN"));
    }

    #[test]
    fn test_payload_shape() {
        let payload = SendMessage {
            chat_id: "42",
            text: "<b>hi</b>",
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["chat_id"], "42");
        assert_eq!(json["parse_mode"], "HTML");
    }
}
