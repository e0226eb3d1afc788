// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Chat Message Log
//!
//! Append-only, ordered record of everything shown in a chat session. Every
//! entry receives a monotonically increasing sequence number on append and is
//! never mutated afterwards; renderers use [`MessageLog::since`] to print only
//! the entries they have not seen yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::execution::{ExecutionId, RunStatus};

/// Author of a chat entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Agent,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Agent => "agent",
            MessageRole::System => "system",
        }
    }
}

/// One entry of the chat log. Construct through [`MessageDraft`] and
/// [`MessageLog::append`]; fields are read-only once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub seq: u64,
    pub id: String,
    pub role: MessageRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
}

impl ChatMessage {
    /// Label shown next to the entry ("You", "System", or the agent name).
    pub fn author_label(&self) -> &str {
        match self.role {
            MessageRole::User => "You",
            MessageRole::System => "System",
            MessageRole::Agent => self.agent_name.as_deref().unwrap_or("AI Agent"),
        }
    }
}

/// A message that has not been appended yet.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    pub id: String,
    pub role: MessageRole,
    pub text: String,
    pub execution_id: Option<ExecutionId>,
    pub agent_name: Option<String>,
    pub status: Option<RunStatus>,
}

impl MessageDraft {
    pub fn new(role: MessageRole, id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            text: text.into(),
            execution_id: None,
            agent_name: None,
            status: None,
        }
    }

    pub fn user(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, id, text)
    }

    pub fn agent(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MessageRole::Agent, id, text)
    }

    pub fn system(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, id, text)
    }

    pub fn with_execution(mut self, execution_id: ExecutionId) -> Self {
        self.execution_id = Some(execution_id);
        self
    }

    pub fn with_agent(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = Some(agent_name.into());
        self
    }

    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Ordered chat log with monotonically increasing sequence numbers.
#[derive(Debug, Clone)]
pub struct MessageLog {
    entries: Vec<ChatMessage>,
    next_seq: u64,
}

impl MessageLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 1,
        }
    }

    /// Append a draft, stamping it with the next sequence number and the
    /// current time.
    pub fn append(&mut self, draft: MessageDraft) -> &ChatMessage {
        let message = ChatMessage {
            seq: self.next_seq,
            id: draft.id,
            role: draft.role,
            text: draft.text,
            timestamp: Utc::now(),
            execution_id: draft.execution_id,
            agent_name: draft.agent_name,
            status: draft.status,
        };
        self.next_seq += 1;
        self.entries.push(message);
        &self.entries[self.entries.len() - 1]
    }

    pub fn extend(&mut self, drafts: impl IntoIterator<Item = MessageDraft>) {
        for draft in drafts {
            self.append(draft);
        }
    }

    pub fn entries(&self) -> &[ChatMessage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.entries.last()
    }

    /// Entries appended after the entry with sequence number `seq`.
    pub fn since(&self, seq: u64) -> &[ChatMessage] {
        let start = self.entries.partition_point(|message| message.seq <= seq);
        &self.entries[start..]
    }

    /// Sequence number of the newest entry, or 0 for an empty log.
    pub fn last_seq(&self) -> u64 {
        self.entries.last().map(|message| message.seq).unwrap_or(0)
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_numbers_increase_from_one() {
        let mut log = MessageLog::new();
        log.append(MessageDraft::user("user-1", "hello"));
        log.append(MessageDraft::system("system-1", "starting"));
        log.append(MessageDraft::agent("exec-reasoning-0", "thinking"));

        let seqs: Vec<u64> = log.entries().iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(log.last_seq(), 3);
    }

    #[test]
    fn test_default_log_also_starts_at_one() {
        let mut log = MessageLog::default();
        assert_eq!(log.append(MessageDraft::user("user-1", "hi")).seq, 1);
    }

    #[test]
    fn test_since_returns_only_newer_entries() {
        let mut log = MessageLog::new();
        for i in 0..5 {
            log.append(MessageDraft::agent(format!("m-{i}"), format!("step {i}")));
        }

        let newer = log.since(3);
        assert_eq!(newer.len(), 2);
        assert_eq!(newer[0].text, "step 3");
        assert!(log.since(5).is_empty());
        assert_eq!(log.since(0).len(), 5);
    }

    #[test]
    fn test_author_label() {
        let mut log = MessageLog::new();
        let anonymous = log.append(MessageDraft::agent("a", "x")).clone();
        let named = log
            .append(MessageDraft::agent("b", "y").with_agent("Risk Agent"))
            .clone();

        assert_eq!(anonymous.author_label(), "AI Agent");
        assert_eq!(named.author_label(), "Risk Agent");
    }
}
