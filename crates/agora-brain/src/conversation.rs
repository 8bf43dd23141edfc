//! Per-agent conversation logs.
//!
//! Each agent has one append-only log holding every message it sent or
//! received. A brain remembers how far into its log it has read (its
//! cursor); the unread tail, minus its own messages, is its inbox for the
//! next decision cycle.

use std::collections::BTreeMap;

use agora_types::ConversationEntry;

/// Messages that arrived since an agent last looked, and the cursor to
/// store once they have been consumed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inbox {
    /// Unread messages addressed to the agent, oldest first.
    pub entries: Vec<ConversationEntry>,
    /// Log length after reading.
    pub cursor: usize,
}

/// Conversation logs keyed by agent id.
#[derive(Debug, Clone, Default)]
pub struct ConversationBook {
    logs: BTreeMap<String, Vec<ConversationEntry>>,
}

impl ConversationBook {
    /// Create a book with an empty log for each agent id.
    pub fn new<I, S>(agent_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            logs: agent_ids.into_iter().map(|id| (id.into(), Vec::new())).collect(),
        }
    }

    /// Start an empty log for `agent_id`. Returns `false` if one exists.
    pub fn add_agent(&mut self, agent_id: &str) -> bool {
        if self.logs.contains_key(agent_id) {
            return false;
        }
        self.logs.insert(agent_id.to_owned(), Vec::new());
        true
    }

    /// Drop the log of `agent_id`. Returns `false` if there was none.
    pub fn remove_agent(&mut self, agent_id: &str) -> bool {
        self.logs.remove(agent_id).is_some()
    }

    /// Empty the log of `agent_id` only. Returns `false` for unknown ids.
    pub fn reset_agent(&mut self, agent_id: &str) -> bool {
        self.logs.get_mut(agent_id).map(Vec::clear).is_some()
    }

    /// Append `entry` to the log of `agent_id`. Unknown ids are ignored.
    pub fn append(&mut self, agent_id: &str, entry: ConversationEntry) {
        if let Some(log) = self.logs.get_mut(agent_id) {
            log.push(entry);
        }
    }

    /// The full log of `agent_id`, oldest first.
    pub fn log(&self, agent_id: &str) -> Option<&[ConversationEntry]> {
        self.logs.get(agent_id).map(Vec::as_slice)
    }

    /// Messages in `agent_id`'s log after `cursor` that were not spoken by
    /// `own_name`.
    ///
    /// A cursor past the end means the log was cleared since it was taken;
    /// the whole log is unread then.
    pub fn inbox(&self, agent_id: &str, cursor: usize, own_name: &str) -> Inbox {
        let log = self.log(agent_id).unwrap_or_default();
        let unread = log.get(cursor..).unwrap_or(log);
        Inbox {
            entries: unread
                .iter()
                .filter(|e| e.speaker != own_name)
                .cloned()
                .collect(),
            cursor: log.len(),
        }
    }

    /// Empty every log.
    pub fn clear(&mut self) {
        for log in self.logs.values_mut() {
            log.clear();
        }
    }
}
