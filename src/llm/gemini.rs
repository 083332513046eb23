use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::StreamExt;
use log::{debug, info};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{BoxError, ChatProvider, ProviderConfig, TokenStream};
use crate::media::DataUri;
use crate::models::chat::{Message, Role};

static HTTP: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    tools: Vec<Tool>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct Tool {
    #[serde(rename = "googleSearch")]
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct GoogleSearch {}

#[derive(Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

// Fixed generation parameters. Not tunable per request.
const GENERATION_CONFIG: GenerationConfig = GenerationConfig {
    temperature: 0.7,
    top_k: 1,
    top_p: 1.0,
    max_output_tokens: 2048,
};

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

fn safety_settings() -> Vec<SafetySetting> {
    [
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category,
        threshold: "BLOCK_MEDIUM_AND_ABOVE",
    })
    .collect()
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl StreamChunk {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
    }
}

/// Extract the text delta carried by one line of a `streamGenerateContent`
/// response. The endpoint frames its output as a JSON array, compact or
/// pretty-printed depending on the serving path, so a line is either array
/// punctuation (no delta), a whole chunk object, or a lone `"text"` field.
fn parse_stream_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || matches!(line, "[" | "]" | ",") {
        return None;
    }

    if line.starts_with('{') {
        let object = line.strip_suffix(',').unwrap_or(line);
        if !object.ends_with('}') {
            return None;
        }
        return serde_json::from_str::<StreamChunk>(object)
            .ok()
            .and_then(StreamChunk::first_text);
    }

    let rest = line.strip_prefix("\"text\"")?;
    let value = rest.trim_start().strip_prefix(':')?.trim().trim_end_matches(',');
    serde_json::from_str::<String>(value).ok()
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "model",
    }
}

fn content_for(message: &Message, role: &'static str) -> Result<Content, BoxError> {
    let mut parts = vec![Part::Text { text: message.content.clone() }];
    if let Some(uri) = &message.image {
        let image = DataUri::parse(uri)?;
        parts.push(Part::InlineData {
            inline_data: InlineData {
                mime_type: image.mime_type,
                data: BASE64.encode(&image.data),
            },
        });
    }
    Ok(Content { role, parts })
}

/// Project prior messages plus the current turn into Gemini contents. The
/// current turn always rides as `user`, whatever its tag on the wire was.
fn build_contents(history: &[Message], turn: &Message) -> Result<Vec<Content>, BoxError> {
    let mut contents = Vec::with_capacity(history.len() + 1);
    for message in history {
        contents.push(content_for(message, role_name(message.role))?);
    }
    contents.push(content_for(turn, "user")?);
    Ok(contents)
}

pub struct GeminiClient {
    config: ProviderConfig,
}

impl GeminiClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            self.config.api_key,
        )
    }
}

#[async_trait]
impl ChatProvider for GeminiClient {
    async fn stream_reply(
        &self,
        history: &[Message],
        turn: &Message,
    ) -> Result<TokenStream, BoxError> {
        let request = GenerateRequest {
            contents: build_contents(history, turn)?,
            tools: vec![Tool { google_search: GoogleSearch {} }],
            generation_config: GENERATION_CONFIG,
            safety_settings: safety_settings(),
        };

        info!(
            "GeminiClient::stream_reply() → model={} history_len={} has_image={}",
            self.config.model,
            history.len(),
            turn.image.is_some()
        );

        let send = HTTP.post(self.endpoint()).json(&request).send();
        let response = tokio::time::timeout(self.config.first_byte_timeout, send)
            .await
            .map_err(|_| {
                format!(
                    "Gemini did not respond within {}s",
                    self.config.first_byte_timeout.as_secs()
                )
            })??;

        if let Err(status_error) = response.error_for_status_ref() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("{}: {}", status_error, body.trim()).into());
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            // Network chunks can split a JSON line; carry the tail over.
            let mut pending = String::new();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(buf) => {
                        pending.push_str(&String::from_utf8_lossy(&buf));
                        while let Some(pos) = pending.find('\n') {
                            let line: String = pending.drain(..=pos).collect();
                            match parse_stream_line(&line) {
                                Some(delta) => {
                                    if tx.send(Ok(delta)).await.is_err() {
                                        // Receiver went away; stop reading.
                                        return;
                                    }
                                }
                                None => {
                                    if line.trim_start().starts_with('{') {
                                        debug!("Gemini chunk carried no text delta, skipping");
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(Box::new(e) as BoxError)).await;
                        return;
                    }
                }
            }
            if let Some(delta) = parse_stream_line(&pending) {
                let _ = tx.send(Ok(delta)).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
