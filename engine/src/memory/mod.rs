//! Agent Conversation Memory
//!
//! Each agent owns a bounded short-term history of (role, content, timestamp)
//! turns. Histories live in fixed-capacity ring buffers: once a buffer is
//! full, appending overwrites the oldest slot and advances the head, so
//! eviction never shifts the remaining turns.
//!
//! Appends for one agent are serialized by that agent's mutex; different
//! agents never contend beyond the brief map lookup.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => f.write_str("user"),
            TurnRole::Assistant => f.write_str("assistant"),
        }
    }
}

/// A single remembered exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }
}

/// Fixed-capacity ring of turns, oldest first
#[derive(Debug, Clone)]
pub struct ConversationBuffer {
    slots: Vec<Option<Turn>>,

    /// Slot holding the oldest turn
    head: usize,

    len: usize,
}

impl ConversationBuffer {
    /// Create a buffer holding at most `capacity` turns.
    ///
    /// `capacity` must be non-zero; [`MemoryStore::new`] enforces this.
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a turn, evicting the oldest one when full
    pub fn push(&mut self, turn: Turn) {
        let capacity = self.capacity();
        if self.len < capacity {
            self.slots[(self.head + self.len) % capacity] = Some(turn);
            self.len += 1;
        } else {
            self.slots[self.head] = Some(turn);
            self.head = (self.head + 1) % capacity;
        }
    }

    /// Turns in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Turn> + '_ {
        let capacity = self.capacity();
        (0..self.len).filter_map(move |offset| self.slots[(self.head + offset) % capacity].as_ref())
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.len = 0;
    }
}

/// Per-agent memory buffers
#[derive(Debug)]
pub struct MemoryStore {
    limit: usize,
    buffers: RwLock<HashMap<String, Arc<Mutex<ConversationBuffer>>>>,
}

impl MemoryStore {
    /// Create a store whose buffers hold `limit` turns each
    pub fn new(limit: usize) -> Result<Self, EngineError> {
        if limit == 0 {
            return Err(EngineError::Config(
                "short-term memory limit must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            limit,
            buffers: RwLock::new(HashMap::new()),
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn buffer(&self, agent_id: &str) -> Arc<Mutex<ConversationBuffer>> {
        {
            let buffers = self.buffers.read().expect("MemoryStore lock poisoned");
            if let Some(buffer) = buffers.get(agent_id) {
                return Arc::clone(buffer);
            }
        }

        let mut buffers = self.buffers.write().expect("MemoryStore lock poisoned");
        Arc::clone(
            buffers
                .entry(agent_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ConversationBuffer::with_capacity(self.limit)))),
        )
    }

    fn existing(&self, agent_id: &str) -> Option<Arc<Mutex<ConversationBuffer>>> {
        self.buffers
            .read()
            .expect("MemoryStore lock poisoned")
            .get(agent_id)
            .cloned()
    }

    /// Append a turn to an agent's history
    pub fn append(&self, agent_id: &str, turn: Turn) {
        let buffer = self.buffer(agent_id);
        buffer
            .lock()
            .expect("ConversationBuffer lock poisoned")
            .push(turn);
    }

    /// An agent's turns, oldest first. Unknown agents have an empty history.
    pub fn history(&self, agent_id: &str) -> Vec<Turn> {
        match self.existing(agent_id) {
            Some(buffer) => buffer
                .lock()
                .expect("ConversationBuffer lock poisoned")
                .iter()
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn len(&self, agent_id: &str) -> usize {
        self.existing(agent_id)
            .map(|buffer| buffer.lock().expect("ConversationBuffer lock poisoned").len())
            .unwrap_or(0)
    }

    /// Empty an agent's history, keeping its buffer
    pub fn clear(&self, agent_id: &str) {
        if let Some(buffer) = self.existing(agent_id) {
            buffer
                .lock()
                .expect("ConversationBuffer lock poisoned")
                .clear();
        }
    }

    /// Drop an agent's buffer entirely
    pub fn forget(&self, agent_id: &str) {
        self.buffers
            .write()
            .expect("MemoryStore lock poisoned")
            .remove(agent_id);
    }
}
