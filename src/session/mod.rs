pub mod notify;

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use log::{info, warn};
use thiserror::Error;
use uuid::Uuid;

use self::notify::{Notification, Notifier};
use crate::media::DataUri;
use crate::models::chat::{ChatRequest, Message};

/// What a call to [`ChatSession::submit`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Input was blank or another submission was in flight; nothing changed.
    Ignored,
    /// The reply streamed to completion.
    Completed,
    /// The request failed and the placeholder was rolled back.
    Failed,
}

#[derive(Debug, Error)]
enum TurnError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("An error occurred: {status} {body}")]
    Status { status: reqwest::StatusCode, body: String },
}

/// Incremental UTF-8 decoder for the response body. Bytes that end
/// mid-codepoint are held back until the rest of the sequence arrives, so a
/// multibyte character split across network chunks renders intact.
#[derive(Default)]
struct StreamDecoder {
    carry: Vec<u8>,
}

impl StreamDecoder {
    fn push(&mut self, chunk: &[u8]) -> String {
        self.carry.extend_from_slice(chunk);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.carry) {
                Ok(text) => {
                    out.push_str(text);
                    self.carry.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.carry[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.carry.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete tail; wait for the next chunk.
                            self.carry.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }
}

/// Owns the conversation and drives the submit → stream → append cycle
/// against a relay endpoint.
pub struct ChatSession {
    messages: Vec<Message>,
    relay_url: String,
    password: Option<String>,
    auth_required: bool,
    http: reqwest::Client,
    notifier: Arc<dyn Notifier>,
    conversation_id: String,
    in_flight: bool,
    id_seq: u64,
}

impl ChatSession {
    pub fn new(relay_url: String, password: Option<String>, notifier: Arc<dyn Notifier>) -> Self {
        let conversation_id = Uuid::new_v4().to_string();
        info!("Starting chat session {}", conversation_id);
        Self {
            messages: Vec::new(),
            relay_url,
            password,
            auth_required: false,
            http: reqwest::Client::new(),
            notifier,
            conversation_id,
            in_flight: false,
            id_seq: 0,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn set_password(&mut self, password: Option<String>) {
        self.password = password;
    }

    /// True once the relay has rejected a password and none is held, meaning
    /// the driver should prompt before the next submission.
    pub fn needs_password(&self) -> bool {
        self.auth_required && self.password.is_none()
    }

    fn next_id(&mut self) -> String {
        self.id_seq += 1;
        format!("{}-{}", Utc::now().timestamp_millis(), self.id_seq)
    }

    /// Submit one user turn. Appends the user message and a model
    /// placeholder, streams the reply into the placeholder, and calls
    /// `on_delta` for each decoded fragment so a rendering layer can follow
    /// along. On any failure the placeholder is removed and a single error
    /// notification is emitted, leaving only the user message behind.
    pub async fn submit<F>(
        &mut self,
        text: &str,
        image: Option<DataUri>,
        on_delta: F,
    ) -> SubmitOutcome
    where
        F: FnMut(&str),
    {
        if text.trim().is_empty() && image.is_none() {
            return SubmitOutcome::Ignored;
        }
        if self.in_flight {
            warn!(
                "[{}] submission ignored: another request is in flight",
                self.conversation_id
            );
            return SubmitOutcome::Ignored;
        }
        self.in_flight = true;

        let user_id = self.next_id();
        self.messages.push(Message::user(
            user_id,
            text.to_string(),
            image.map(|i| i.to_string()),
        ));

        let placeholder_id = self.next_id();
        self.messages.push(Message::placeholder(placeholder_id.clone()));

        let outcome = match self.stream_turn(&placeholder_id, on_delta).await {
            Ok(()) => SubmitOutcome::Completed,
            Err(e) => {
                if let TurnError::Status { status, .. } = &e {
                    if *status == reqwest::StatusCode::UNAUTHORIZED {
                        self.password = None;
                        self.auth_required = true;
                    }
                }
                self.messages.retain(|m| m.id != placeholder_id);
                self.notifier.notify(Notification::error("Error", e.to_string()));
                SubmitOutcome::Failed
            }
        };
        self.in_flight = false;
        outcome
    }

    async fn stream_turn<F>(&mut self, placeholder_id: &str, mut on_delta: F) -> Result<(), TurnError>
    where
        F: FnMut(&str),
    {
        // Everything except the placeholder itself rides in the request.
        let outbound: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.id != placeholder_id)
            .cloned()
            .collect();
        let request = ChatRequest { messages: outbound, password: self.password.clone() };

        info!(
            "[{}] submitting turn with {} messages",
            self.conversation_id,
            request.messages.len()
        );

        let response = self.http.post(&self.relay_url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TurnError::Status { status, body });
        }

        let mut decoder = StreamDecoder::default();
        let mut bytes = response.bytes_stream();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            let delta = decoder.push(&chunk);
            if !delta.is_empty() {
                self.append_delta(placeholder_id, &delta);
                on_delta(&delta);
            }
        }
        Ok(())
    }

    /// Append a delta to the message with `id` by replacing it in the
    /// sequence with an updated value. Observers of the sequence see a fresh
    /// message, never one mutated behind their back.
    fn append_delta(&mut self, id: &str, delta: &str) {
        self.messages = self
            .messages
            .iter()
            .map(|m| {
                if m.id == id {
                    let mut updated = m.clone();
                    updated.content.push_str(delta);
                    updated
                } else {
                    m.clone()
                }
            })
            .collect();
    }

    /// Reset the conversation to empty. Always succeeds.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.notifier.notify(Notification::info(
            "Session Cleared",
            "Your chat history has been cleared.",
        ));
    }
}
