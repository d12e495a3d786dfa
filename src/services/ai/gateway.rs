use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

use super::{ChatProvider, StreamFragment};
use crate::models::ChatMessage;
use crate::services::stream::SseParser;

/// Whole-request deadline, covering the full generation. The widget treats a
/// timeout like any other stream error: one apology, no automatic retry.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// OpenAI-compatible chat gateway speaking `data: <json>` server-sent events.
pub struct ChatGateway {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl ChatGateway {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            base_url,
            api_key,
            model,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl ChatProvider for ChatGateway {
    async fn stream_chat(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
    ) -> anyhow::Result<mpsc::Receiver<anyhow::Result<StreamFragment>>> {
        let mut chat_messages = vec![json!({
            "role": "system",
            "content": system_prompt,
        })];
        for msg in messages {
            chat_messages.push(json!({
                "role": msg.role,
                "content": msg.content,
            }));
        }

        let body = json!({
            "model": self.model,
            "messages": chat_messages,
            "stream": true,
        });

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to call chat gateway")?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!("chat gateway error ({status}): {detail}");
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut parser = SseParser::new();
            let mut bytes = resp.bytes_stream();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(anyhow::Error::from(e))).await;
                        return;
                    }
                };
                match parser.push(&chunk) {
                    Ok(fragments) => {
                        for fragment in fragments {
                            if tx.send(Ok(fragment)).await.is_err() {
                                return; // receiver hung up, stop reading
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
                if parser.is_done() {
                    return;
                }
            }

            if !parser.is_done() {
                let _ = tx
                    .send(Err(anyhow::anyhow!(
                        "chat stream ended before completion sentinel"
                    )))
                    .await;
            }
        });

        Ok(rx)
    }
}
