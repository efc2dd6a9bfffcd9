use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;
use super::orchestrator::HistorySink;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    #[serde(flatten)]
    pub message: Message,
    pub committed_at: DateTime<Utc>,
}

/// In-memory conversation history fed by completed streams.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    entries: VecDeque<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.entries.push_back(TranscriptEntry {
            message,
            committed_at: Utc::now(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter()
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|entry| &entry.message)
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.back().map(|entry| &entry.message)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl HistorySink for Transcript {
    fn commit(&mut self, message: Message) {
        self.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commits_append_in_order() {
        let mut transcript = Transcript::new();
        transcript.commit(Message::user("question"));
        transcript.commit(Message::assistant("answer"));

        let roles: Vec<_> = transcript.messages().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant"]);
        assert_eq!(transcript.last().map(|m| m.content.as_str()), Some("answer"));
    }

    #[test]
    fn json_round_trip_keeps_flat_message_fields() {
        let mut transcript = Transcript::new();
        transcript.push(Message::assistant("## 回复：\nok"));

        let json = transcript.to_json().unwrap();
        assert!(json.contains(r#""role": "assistant""#));
        assert!(json.contains("committed_at"));
        assert_eq!(Transcript::from_json(&json).unwrap(), transcript);
    }
}
