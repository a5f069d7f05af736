//! Console adapter.
//!
//! Implements the `aya-core` MessagingPort over a line-oriented terminal so the
//! bot can be driven from stdin without a chat network attached.

use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

pub mod input;
pub mod router;

use aya_core::{
    domain::{ChatId, MessageId, MessageRef, SenderId},
    messaging::{
        port::MessagingPort,
        types::{OutgoingMessage, ParticipantUpdate, SendOptions},
    },
    Result,
};

/// Prints outbound messages to `out` and simulates group metadata in memory.
pub struct ConsoleMessenger<W> {
    out: Mutex<W>,
    admins: Mutex<HashSet<(ChatId, SenderId)>>,
    members: Mutex<HashMap<ChatId, HashSet<SenderId>>>,
    next_id: AtomicU64,
}

impl ConsoleMessenger<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl ConsoleMessenger<Vec<u8>> {
    /// Everything written so far (tests).
    pub async fn output(&self) -> String {
        String::from_utf8_lossy(&self.out.lock().await).into_owned()
    }
}

impl<W: AsyncWrite + Unpin + Send> ConsoleMessenger<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            admins: Mutex::new(HashSet::new()),
            members: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn grant_admin(&self, chat_id: ChatId, sender_id: SenderId) {
        self.admins.lock().await.insert((chat_id, sender_id));
    }

    /// Record `participants` as members of `chat_id`.
    pub async fn join(&self, chat_id: &ChatId, participants: &[SenderId]) {
        let mut members = self.members.lock().await;
        members
            .entry(chat_id.clone())
            .or_default()
            .extend(participants.iter().cloned());
    }

    /// Operator-facing line, not a chat message.
    pub async fn notice(&self, text: &str) -> Result<()> {
        self.write(&format!("** {text}\n")).await
    }

    async fn write(&self, s: &str) -> Result<()> {
        let mut out = self.out.lock().await;
        out.write_all(s.as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }
}

fn render(id: &MessageId, chat_id: &ChatId, payload: &OutgoingMessage, options: &SendOptions) -> String {
    let mut head = format!("[{chat_id}] #{}", id.0);
    if payload.edit.is_some() {
        head.push_str(" (edited)");
    }
    if let Some(q) = &options.quoted {
        head.push_str(&format!(" (reply to #{})", q.message_id.0));
    }
    if !payload.mentions.is_empty() {
        let names: Vec<String> = payload
            .mentions
            .iter()
            .map(|m| format!("@{}", m.number()))
            .collect();
        head.push_str(&format!(" {}", names.join(" ")));
    }

    let mut out = head;
    for line in payload.text.lines() {
        out.push_str("\n    ");
        out.push_str(line);
    }
    out.push('\n');
    out
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send + 'static> MessagingPort for ConsoleMessenger<W> {
    async fn send_message(
        &self,
        chat_id: &ChatId,
        payload: OutgoingMessage,
        options: SendOptions,
    ) -> Result<MessageRef> {
        let message_ref = match &payload.edit {
            Some(target) => target.clone(),
            None => MessageRef {
                chat_id: chat_id.clone(),
                message_id: MessageId(format!(
                    "out{}",
                    self.next_id.fetch_add(1, Ordering::SeqCst)
                )),
            },
        };
        self.write(&render(&message_ref.message_id, chat_id, &payload, &options))
            .await?;
        Ok(message_ref)
    }

    async fn is_group_admin(&self, chat_id: &ChatId, sender_id: &SenderId) -> Result<bool> {
        Ok(self
            .admins
            .lock()
            .await
            .contains(&(chat_id.clone(), sender_id.clone())))
    }

    async fn add_participants(
        &self,
        chat_id: &ChatId,
        participants: &[SenderId],
    ) -> Result<Vec<ParticipantUpdate>> {
        let mut members = self.members.lock().await;
        let group = members.entry(chat_id.clone()).or_default();
        Ok(participants
            .iter()
            .map(|p| ParticipantUpdate {
                participant: p.clone(),
                status: if group.insert(p.clone()) { 200 } else { 409 },
            })
            .collect())
    }
}
