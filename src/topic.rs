//! Typed subscription topics.
//!
//! Topic paths arrive as strings on the channel; everything downstream works
//! with the closed set of variants produced here.

use std::fmt;

use crate::error::ChatError;

/// A pub/sub address a channel may subscribe or publish to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// `/chat/{chat_id}` — broadcast messages of one chat.
    Chat(i64),
    /// `/chat/read/{chat_id}` — read-state broadcasts for one chat.
    /// Reserved: accepted for subscription, nothing publishes here yet.
    ChatRead(i64),
    /// `/alarm/{user_id}` — unread summaries for a single user.
    Alarm(i64),
}

impl Topic {
    /// Parse a topic path. Fails with `MalformedSubscription` on any shape
    /// outside the closed set.
    pub fn parse(path: &str) -> Result<Topic, ChatError> {
        let malformed = || ChatError::MalformedSubscription(path.to_string());

        let rest = path.strip_prefix('/').ok_or_else(malformed)?;
        let segments: Vec<&str> = rest.split('/').collect();

        match segments.as_slice() {
            ["chat", "read", id] => {
                let chat_id = id.parse::<i64>().map_err(|_| malformed())?;
                Ok(Topic::ChatRead(chat_id))
            }
            ["chat", id] => {
                let chat_id = id.parse::<i64>().map_err(|_| malformed())?;
                Ok(Topic::Chat(chat_id))
            }
            ["alarm", id] => {
                let user_id = id.parse::<i64>().map_err(|_| malformed())?;
                Ok(Topic::Alarm(user_id))
            }
            _ => Err(malformed()),
        }
    }

    /// The chat id for chat-scoped topics.
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Topic::Chat(id) | Topic::ChatRead(id) => Some(*id),
            Topic::Alarm(_) => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Chat(id) => write!(f, "/chat/{id}"),
            Topic::ChatRead(id) => write!(f, "/chat/read/{id}"),
            Topic::Alarm(id) => write!(f, "/alarm/{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_three_shapes() {
        assert_eq!(Topic::parse("/chat/12").unwrap(), Topic::Chat(12));
        assert_eq!(Topic::parse("/chat/read/12").unwrap(), Topic::ChatRead(12));
        assert_eq!(Topic::parse("/alarm/7").unwrap(), Topic::Alarm(7));
    }

    #[test]
    fn display_round_trips() {
        for topic in [Topic::Chat(3), Topic::ChatRead(3), Topic::Alarm(9)] {
            assert_eq!(Topic::parse(&topic.to_string()).unwrap(), topic);
        }
    }

    #[test]
    fn rejects_malformed_paths() {
        for path in [
            "",
            "/",
            "/chat",
            "/chat/",
            "/chat/abc",
            "/chat/read",
            "/chat/read/abc",
            "/chat/12/extra",
            "/alarm",
            "/alarm/x",
            "/presence/1",
            "chat/12",
        ] {
            assert!(
                matches!(Topic::parse(path), Err(ChatError::MalformedSubscription(_))),
                "expected {path:?} to be rejected"
            );
        }
    }
}
