use serde::{ Serialize, Deserialize };

/// Who authored a message. The wire values are Gemini's own role vocabulary,
/// so no translation happens at the provider boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One entry in a conversation. `content` may be empty while a model reply
/// is still streaming in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Data URI of an attached image. Only ever set on user messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Message {
    pub fn user(id: String, content: String, image: Option<String>) -> Self {
        Self { id, role: Role::User, content, image }
    }

    /// An empty model message, appended at submission time and filled in as
    /// the reply streams.
    pub fn placeholder(id: String) -> Self {
        Self { id, role: Role::Model, content: String::new(), image: None }
    }
}

/// Wire payload of `POST /api/chat`. Built fresh for every submission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}
