use std::fmt;

/// Sender identity as reported by the transport (e.g. `212600000000@s.whatsapp.net`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SenderId(pub String);

/// Chat identity. Group chats carry the `@g.us` suffix.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub String);

/// Transport-assigned message id (string).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

/// A stable reference to a delivered message, used for quoting and edits.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

const GROUP_SUFFIX: &str = "@g.us";
const USER_SUFFIX: &str = "@s.whatsapp.net";

impl ChatId {
    pub fn is_group(&self) -> bool {
        self.0.ends_with(GROUP_SUFFIX)
    }
}

impl SenderId {
    /// Build a user id from a bare phone number (`212600000000`).
    pub fn from_number(number: &str) -> Self {
        Self(format!("{number}{USER_SUFFIX}"))
    }

    /// The numeric part of the id, without the server suffix.
    pub fn number(&self) -> &str {
        self.0.split('@').next().unwrap_or(&self.0)
    }
}

impl From<&SenderId> for ChatId {
    fn from(s: &SenderId) -> Self {
        ChatId(s.0.clone())
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
