use agendum_schema::{Role, Turn, TurnKind};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Bounds for in-memory conversation history. Oldest turns and
/// least-recently-active chats are trimmed first.
#[derive(Debug, Clone)]
pub struct EvictionPolicy {
    pub max_conversations: usize,
    pub max_turns_per_chat: usize,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_conversations: 1024,
            max_turns_per_chat: 256,
        }
    }
}

struct Conversation {
    turns: Vec<Turn>,
    last_active: DateTime<Utc>,
}

/// Per-chat turn history. Append and read lock internally, so a single
/// append is atomic; ordering between concurrent messages from the same
/// chat is whatever the transport delivers.
pub struct ConversationStore {
    conversations: Mutex<HashMap<i64, Conversation>>,
    policy: EvictionPolicy,
}

impl ConversationStore {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
            policy,
        }
    }

    pub fn append(&self, chat_id: i64, role: Role, content: impl Into<String>, kind: TurnKind) {
        let turn = Turn::new(role, content, kind);
        let mut map = self.conversations.lock().unwrap_or_else(|e| e.into_inner());

        if !map.contains_key(&chat_id) && map.len() >= self.policy.max_conversations {
            if let Some(oldest) = map
                .iter()
                .min_by_key(|(_, conv)| conv.last_active)
                .map(|(id, _)| *id)
            {
                debug!(chat_id = oldest, "evicting least-recently-active conversation");
                map.remove(&oldest);
            }
        }

        let conv = map.entry(chat_id).or_insert_with(|| Conversation {
            turns: Vec::new(),
            last_active: Utc::now(),
        });
        conv.last_active = Utc::now();
        conv.turns.push(turn);

        if conv.turns.len() > self.policy.max_turns_per_chat {
            let excess = conv.turns.len() - self.policy.max_turns_per_chat;
            conv.turns.drain(..excess);
        }
    }

    /// Last `limit` turns in chronological order; empty for an unknown chat.
    pub fn recent(&self, chat_id: i64, limit: usize) -> Vec<Turn> {
        let map = self.conversations.lock().unwrap_or_else(|e| e.into_inner());
        match map.get(&chat_id) {
            Some(conv) => {
                let skip = conv.turns.len().saturating_sub(limit);
                conv.turns[skip..].to_vec()
            }
            None => Vec::new(),
        }
    }
}
