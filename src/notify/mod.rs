//! Chat notification sink.
//!
//! The runner only needs "send this text to that chat". Delivery is
//! best effort: callers log failures and move on, the signal state has
//! already advanced by the time a message goes out.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error {status}: {description}")]
    Api { status: u16, description: String },
}

pub trait Notifier: Send + Sync {
    fn send<'a>(&'a self, chat_id: &'a str, text: &'a str) -> BoxFuture<'a, Result<(), NotifyError>>;
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Deserialize)]
struct BotUser {
    #[serde(default)]
    username: Option<String>,
}

/// Telegram Bot API client.
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl TelegramNotifier {
    pub fn new(api_url: String, token: String) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    async fn read_response<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<Option<T>, NotifyError> {
        let status = resp.status().as_u16();
        // The token is part of the URL; keep it out of error text
        let body: ApiResponse<T> = resp.json().await.map_err(|e| {
            if status >= 400 {
                NotifyError::Api {
                    status,
                    description: "unreadable error body".to_string(),
                }
            } else {
                NotifyError::Request(e.without_url())
            }
        })?;
        if status >= 400 || !body.ok {
            return Err(NotifyError::Api {
                status,
                description: body.description.unwrap_or_default(),
            });
        }
        Ok(body.result)
    }

    /// POST sendMessage with Markdown parse mode.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        let payload = SendMessage {
            chat_id,
            text,
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };
        let resp = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.without_url()))?;

        Self::read_response::<serde_json::Value>(resp).await?;
        debug!(chat = %chat_id, len = text.len(), "message delivered");
        Ok(())
    }

    /// getMe; used by the pre-flight check to confirm the token.
    pub async fn bot_username(&self) -> Result<String, NotifyError> {
        let resp = self
            .client
            .get(self.method_url("getMe"))
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.without_url()))?;

        let user: Option<BotUser> = Self::read_response(resp).await?;
        Ok(user.and_then(|u| u.username).unwrap_or_default())
    }
}

impl Notifier for TelegramNotifier {
    fn send<'a>(&'a self, chat_id: &'a str, text: &'a str) -> BoxFuture<'a, Result<(), NotifyError>> {
        self.send_message(chat_id, text).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers one request with `body` and hands back what it received.
    async fn spawn_api(status: u16, body: &'static str) -> (String, Arc<Mutex<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = seen.clone();

        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut raw = Vec::new();
                let mut buf = [0u8; 4096];
                // Read until the JSON body has arrived
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            raw.extend_from_slice(&buf[..n]);
                            let text = String::from_utf8_lossy(&raw);
                            if text.contains("\r\n\r\n") && (text.ends_with('}') || text.starts_with("GET")) {
                                break;
                            }
                        }
                    }
                }
                *sink.lock().unwrap() = String::from_utf8_lossy(&raw).to_string();
                let reply = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/", addr), seen)
    }

    #[tokio::test]
    async fn test_send_message_posts_markdown() {
        let (url, seen) = spawn_api(200, r#"{"ok":true,"result":{"message_id":7}}"#).await;
        let notifier = TelegramNotifier::new(url, "123:abc".to_string()).unwrap();

        notifier.send("-100200", "GREEN BRANCO").await.unwrap();

        let request = seen.lock().unwrap().clone();
        assert!(request.starts_with("POST /bot123:abc/sendMessage"));
        assert!(request.contains(r#""chat_id":"-100200""#));
        assert!(request.contains(r#""parse_mode":"Markdown""#));
    }

    #[tokio::test]
    async fn test_api_rejection_is_error() {
        let (url, _) = spawn_api(400, r#"{"ok":false,"description":"Bad Request: chat not found"}"#).await;
        let notifier = TelegramNotifier::new(url, "123:abc".to_string()).unwrap();

        match notifier.send("-1", "hi").await {
            Err(NotifyError::Api { status, description }) => {
                assert_eq!(status, 400);
                assert!(description.contains("chat not found"));
            }
            other => panic!("expected API error, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_bot_username() {
        let (url, seen) = spawn_api(200, r#"{"ok":true,"result":{"id":1,"is_bot":true,"username":"branco_bot"}}"#).await;
        let notifier = TelegramNotifier::new(url, "123:abc".to_string()).unwrap();

        assert_eq!(notifier.bot_username().await.unwrap(), "branco_bot");
        assert!(seen.lock().unwrap().starts_with("GET /bot123:abc/getMe"));
    }
}
