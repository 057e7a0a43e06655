use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a conversation. Fields are private so a turn cannot be
/// edited after it is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Chronological, append-only log of turns for one session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Records a completed exchange. The user turn always lands directly
    /// before the assistant turn it produced.
    pub fn record_exchange(&mut self, user: Turn, assistant: Turn) {
        debug_assert_eq!(user.role(), Role::User);
        debug_assert_eq!(assistant.role(), Role::Assistant);
        self.turns.push(user);
        self.turns.push(assistant);
    }

    /// History as the model should see it: everything recorded so far plus
    /// the turn currently being handled.
    pub fn with_pending<'a>(&'a self, pending: &'a Turn) -> impl Iterator<Item = &'a Turn> {
        self.turns.iter().chain(std::iter::once(pending))
    }
}
