//! # Class Records
//!
//! The stored state for one class code and the read-only view returned by
//! `get_state`. Metadata and payloads are opaque JSON documents: the store
//! keeps them verbatim and never looks inside.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::code::ClassCode;

/// Opaque structured payload (class metadata, sensor reading, feedback signal)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Value);

impl Payload {
    /// The empty document `{}`
    pub fn empty() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    pub fn is_empty_object(&self) -> bool {
        matches!(&self.0, Value::Object(map) if map.is_empty())
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// One student feedback signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionEntry {
    pub received_at: DateTime<Utc>,
    pub payload: Payload,
}

/// Insertion-ordered feedback history holding at most `capacity` entries.
///
/// Pushing past capacity drops the oldest entries. The entry just pushed is
/// never dropped because capacity is at least one.
#[derive(Debug, Clone)]
pub struct EmotionLog {
    capacity: usize,
    entries: VecDeque<EmotionEntry>,
}

impl EmotionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Append then trim from the front
    pub fn push(&mut self, entry: EmotionEntry) {
        self.entries.push_back(entry);

        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries oldest-to-newest
    pub fn to_vec(&self) -> Vec<EmotionEntry> {
        self.entries.iter().cloned().collect()
    }
}

/// In-memory state for one class
#[derive(Debug, Clone)]
pub struct ClassRecord {
    pub code: ClassCode,
    pub created_at: DateTime<Utc>,
    pub metadata: Payload,
    pub last_sensor: Option<Payload>,
    pub last_sensor_at: Option<DateTime<Utc>>,
    pub emotion_log: EmotionLog,
}

impl ClassRecord {
    pub fn new(
        code: ClassCode,
        created_at: DateTime<Utc>,
        metadata: Payload,
        emotion_capacity: usize,
    ) -> Self {
        Self {
            code,
            created_at,
            metadata,
            last_sensor: None,
            last_sensor_at: None,
            emotion_log: EmotionLog::new(emotion_capacity),
        }
    }

    /// Replace the sensor reading and its timestamp together
    pub fn set_sensor(&mut self, payload: Payload, at: DateTime<Utc>) {
        self.last_sensor = Some(payload);
        self.last_sensor_at = Some(at);
    }

    pub fn push_emotion(&mut self, payload: Payload, received_at: DateTime<Utc>) {
        self.emotion_log.push(EmotionEntry {
            received_at,
            payload,
        });
    }

    pub fn snapshot(&self) -> ClassState {
        ClassState {
            code: self.code.clone(),
            created_at: self.created_at,
            metadata: self.metadata.clone(),
            last_sensor: self.last_sensor.clone(),
            last_sensor_at: self.last_sensor_at,
            emotion_log: self.emotion_log.to_vec(),
        }
    }
}

/// Read-only snapshot returned by `get_state`.
///
/// Serialized with the field names the polling front end expects
/// (`pin`, `emotions`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassState {
    #[serde(rename = "pin")]
    pub code: ClassCode,
    pub created_at: DateTime<Utc>,
    pub metadata: Payload,
    pub last_sensor: Option<Payload>,
    pub last_sensor_at: Option<DateTime<Utc>>,
    #[serde(rename = "emotions")]
    pub emotion_log: Vec<EmotionEntry>,
}
