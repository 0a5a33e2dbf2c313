use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Ordered chat record for one session.
///
/// Append-only. The single exception is the trailing model message, which is
/// rewritten in place while a reply streams into it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replaces the text of the trailing message if it is a model message.
    /// Returns `false` and leaves the transcript untouched otherwise.
    pub fn replace_last_model(&mut self, text: impl Into<String>) -> bool {
        match self.messages.last_mut() {
            Some(last) if last.role == Role::Model => {
                last.text = text.into();
                true
            }
            _ => false,
        }
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.messages.clone()
    }
}
