//! Console line protocol.
//!
//! ```text
//! 212611111111: .ping              private message
//! 212611111111@1203630: .add 06..  message in group 1203630@g.us
//! !join 1203630 212622222222 ...   participants added to a group
//! !admin 1203630 212611111111      make a member a group admin
//! !reload                          re-scan the plugins directory
//! !quit
//! ```

use aya_core::{
    domain::{ChatId, MessageId, SenderId},
    messaging::types::{InboundEvent, InboundMessage},
};

pub const USAGE: &str = "usage: <number>[@<group>]: <text> | !join <group> <number>... | \
                         !admin <group> <number> | !reload | !quit";

#[derive(Clone, Debug)]
pub enum ConsoleInput {
    Event(InboundEvent),
    GrantAdmin { chat_id: ChatId, sender_id: SenderId },
    Reload,
    Quit,
}

fn group_id(raw: &str) -> ChatId {
    if raw.contains('@') {
        ChatId(raw.to_string())
    } else {
        ChatId(format!("{raw}@g.us"))
    }
}

fn sender_id(raw: &str) -> SenderId {
    if raw.contains('@') {
        SenderId(raw.to_string())
    } else {
        SenderId::from_number(raw.trim_start_matches('+'))
    }
}

/// Turns console lines into inbound events, assigning message ids.
#[derive(Default)]
pub struct LineParser {
    next_id: u64,
}

impl LineParser {
    /// `Ok(None)` for blank lines, `Err` with a hint for malformed ones.
    pub fn parse(&mut self, line: &str) -> Result<Option<ConsoleInput>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        if let Some(rest) = line.strip_prefix('!') {
            let mut parts = rest.split_whitespace();
            let cmd = parts.next().unwrap_or_default();
            let args: Vec<&str> = parts.collect();
            return match (cmd, args.as_slice()) {
                ("reload", []) => Ok(Some(ConsoleInput::Reload)),
                ("quit", []) => Ok(Some(ConsoleInput::Quit)),
                ("admin", [group, number]) => Ok(Some(ConsoleInput::GrantAdmin {
                    chat_id: group_id(group),
                    sender_id: sender_id(number),
                })),
                ("join", [group, numbers @ ..]) if !numbers.is_empty() => {
                    Ok(Some(ConsoleInput::Event(InboundEvent::ParticipantsAdded {
                        chat_id: group_id(group),
                        participants: numbers.iter().map(|n| sender_id(n)).collect(),
                    })))
                }
                _ => Err(USAGE.to_string()),
            };
        }

        let Some((who, text)) = line.split_once(": ") else {
            return Err(USAGE.to_string());
        };
        let (sender, chat_id) = match who.split_once('@') {
            Some((number, group)) if !group.is_empty() => (sender_id(number), group_id(group)),
            _ => {
                let sender = sender_id(who);
                let chat = ChatId::from(&sender);
                (sender, chat)
            }
        };

        self.next_id += 1;
        Ok(Some(ConsoleInput::Event(InboundEvent::Message(InboundMessage {
            chat_id,
            sender_id: sender,
            message_id: MessageId(format!("in{}", self.next_id)),
            text: Some(text.to_string()),
            from_me: false,
        }))))
    }
}
