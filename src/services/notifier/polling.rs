//! Telegram long polling for inbound commands.

use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::{Notifier, TelegramNotifier};
use crate::services::shutdown::{self, sleep_or_shutdown, ShutdownReceiver};

/// Server-side long-poll timeout in seconds.
const POLL_TIMEOUT_SECS: u32 = 30;
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Turns a command line into a reply. An empty reply is not sent.
pub trait CommandHandler: Send + Sync {
    fn handle<'a>(&'a self, command: &'a str) -> Pin<Box<dyn Future<Output = String> + Send + 'a>>;
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    text: Option<String>,
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Commands from the configured chat plus the next update offset.
fn extract_commands(updates: Vec<Update>, chat_id: &str, mut offset: i64) -> (i64, Vec<String>) {
    let mut commands = Vec::new();

    for update in updates {
        offset = offset.max(update.update_id + 1);

        let Some(message) = update.message else {
            continue;
        };
        if message.chat.id.to_string() != chat_id {
            warn!("Ignoring message from unknown chat {}", message.chat.id);
            continue;
        }
        if let Some(text) = message.text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            commands.push(text);
        }
    }

    (offset, commands)
}

/// Poll `getUpdates` until shutdown, answering each command through
/// `handler`.
pub async fn poll_commands(
    telegram: Arc<TelegramNotifier>,
    handler: Arc<dyn CommandHandler>,
    mut shutdown_rx: ShutdownReceiver,
) {
    info!("Telegram command polling started");
    let mut offset: i64 = 0;

    loop {
        if shutdown::is_shutdown(&shutdown_rx) {
            break;
        }

        let request = telegram
            .client()
            .get(telegram.method_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", POLL_TIMEOUT_SECS.to_string()),
            ])
            .send();

        let response = tokio::select! {
            r = request => r,
            _ = shutdown::wait(&mut shutdown_rx) => break,
        };

        let body: UpdatesResponse = match response {
            Ok(resp) => match resp.json().await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Failed to decode Telegram updates: {}", e.without_url());
                    if sleep_or_shutdown(ERROR_BACKOFF, &mut shutdown_rx).await {
                        break;
                    }
                    continue;
                }
            },
            Err(e) => {
                warn!("Telegram polling request failed: {}", e.without_url());
                if sleep_or_shutdown(ERROR_BACKOFF, &mut shutdown_rx).await {
                    break;
                }
                continue;
            }
        };

        if !body.ok {
            warn!("Telegram getUpdates returned ok=false");
            if sleep_or_shutdown(ERROR_BACKOFF, &mut shutdown_rx).await {
                break;
            }
            continue;
        }

        let (next_offset, commands) = extract_commands(body.result, telegram.chat_id(), offset);
        offset = next_offset;

        for command in commands {
            info!("Received command: {}", command);
            let reply = handler.handle(&command).await;
            if reply.is_empty() {
                continue;
            }
            if let Err(e) = telegram.send(&reply).await {
                error!("Failed to send command reply: {}", e);
            }
        }
    }

    info!("Telegram command polling stopped");
}
