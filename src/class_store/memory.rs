//! # In-Memory Backend
//!
//! Records live in a map of per-record locks:
//!
//! - the outer `RwLock` is taken for writing only while reserving a new code
//! - steady-state operations take it for reading just long enough to clone the
//!   record handle, so different classes never block each other
//! - each record's `Mutex` serializes updates to that one class
//!
//! Nothing survives a restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::code::{ClassCode, CodeGenerator};
use super::config::MEMORY_EMOTION_LIMIT;
use super::errors::{StoreError, StoreResult};
use super::record::{ClassRecord, ClassState, Payload};
use super::ClassStore;

type RecordHandle = Arc<Mutex<ClassRecord>>;

/// Process-local class store
#[derive(Debug)]
pub struct InMemoryClassStore {
    classes: RwLock<HashMap<ClassCode, RecordHandle>>,
    generator: CodeGenerator,
    emotion_limit: usize,
    clock: Arc<dyn Clock>,
}

impl InMemoryClassStore {
    /// Create an empty store keeping at most `emotion_limit` emotions per class
    pub fn new(emotion_limit: usize) -> Self {
        Self::with_parts(emotion_limit, CodeGenerator::for_memory(), Arc::new(SystemClock))
    }

    /// Create a store with an explicit generator and time source
    pub fn with_parts(emotion_limit: usize, generator: CodeGenerator, clock: Arc<dyn Clock>) -> Self {
        Self {
            classes: RwLock::new(HashMap::new()),
            generator,
            emotion_limit: emotion_limit.max(1),
            clock,
        }
    }

    /// Number of classes currently held
    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn emotion_limit(&self) -> usize {
        self.emotion_limit
    }

    fn record(&self, code: &ClassCode) -> StoreResult<RecordHandle> {
        self.classes
            .read()
            .get(code)
            .cloned()
            .ok_or_else(|| StoreError::ClassNotFound(code.to_string()))
    }
}

impl Default for InMemoryClassStore {
    fn default() -> Self {
        Self::new(MEMORY_EMOTION_LIMIT)
    }
}

#[async_trait]
impl ClassStore for InMemoryClassStore {
    async fn create_class(&self, metadata: Payload) -> StoreResult<ClassCode> {
        let mut classes = self.classes.write();
        let code = self.generator.generate(|c| classes.contains_key(c))?;

        let record = ClassRecord::new(code.clone(), self.clock.now(), metadata, self.emotion_limit);
        classes.insert(code.clone(), Arc::new(Mutex::new(record)));
        drop(classes);

        info!(code = %code, "class created");
        Ok(code)
    }

    async fn upsert_sensor(&self, code: &ClassCode, payload: Payload) -> StoreResult<()> {
        let handle = self.record(code)?;
        let mut record = handle.lock();
        record.set_sensor(payload, self.clock.now());

        debug!(code = %code, "sensor reading stored");
        Ok(())
    }

    async fn add_emotion(&self, code: &ClassCode, payload: Payload) -> StoreResult<()> {
        let handle = self.record(code)?;
        let mut record = handle.lock();
        record.push_emotion(payload, self.clock.now());

        debug!(code = %code, entries = record.emotion_log.len(), "emotion recorded");
        Ok(())
    }

    async fn get_state(&self, code: &ClassCode) -> StoreResult<ClassState> {
        let handle = self.record(code)?;
        let record = handle.lock();
        Ok(record.snapshot())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_store::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn store_with_clock(limit: usize) -> (InMemoryClassStore, Arc<ManualClock>) {
        let start = Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start, Duration::seconds(1)));
        let store = InMemoryClassStore::with_parts(limit, CodeGenerator::for_memory(), clock.clone());
        (store, clock)
    }

    #[tokio::test]
    async fn test_create_then_read_fresh_state() {
        let (store, clock) = store_with_clock(10);
        let created_at = clock.peek();

        let code = store
            .create_class(Payload::new(json!({"teacher": "Ms. Rivera"})))
            .await
            .unwrap();
        let state = store.get_state(&code).await.unwrap();

        assert_eq!(state.code, code);
        assert_eq!(state.created_at, created_at);
        assert_eq!(state.metadata, Payload::new(json!({"teacher": "Ms. Rivera"})));
        assert!(state.last_sensor.is_none());
        assert!(state.last_sensor_at.is_none());
        assert!(state.emotion_log.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sensor_timestamp_set_with_payload() {
        let (store, clock) = store_with_clock(10);
        let code = store.create_class(Payload::empty()).await.unwrap();

        let at = clock.peek();
        store
            .upsert_sensor(&code, Payload::new(json!({"co2": 812})))
            .await
            .unwrap();

        let state = store.get_state(&code).await.unwrap();
        assert_eq!(state.last_sensor, Some(Payload::new(json!({"co2": 812}))));
        assert_eq!(state.last_sensor_at, Some(at));
    }

    #[tokio::test]
    async fn test_emotions_capped_oldest_first() {
        let (store, _clock) = store_with_clock(2);
        let code = store.create_class(Payload::empty()).await.unwrap();

        for pace in ["slow", "ok", "fast"] {
            store
                .add_emotion(&code, Payload::new(json!({ "pace": pace })))
                .await
                .unwrap();
        }

        let state = store.get_state(&code).await.unwrap();
        let paces: Vec<_> = state
            .emotion_log
            .iter()
            .map(|e| e.payload.as_value()["pace"].clone())
            .collect();
        assert_eq!(paces, vec![json!("ok"), json!("fast")]);
        assert!(state.emotion_log[0].received_at < state.emotion_log[1].received_at);
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found() {
        let store = InMemoryClassStore::default();
        let code = ClassCode::parse("99999").unwrap();

        assert_eq!(
            store.upsert_sensor(&code, Payload::empty()).await,
            Err(StoreError::ClassNotFound("99999".into()))
        );
        assert_eq!(
            store.add_emotion(&code, Payload::empty()).await,
            Err(StoreError::ClassNotFound("99999".into()))
        );
        assert!(matches!(
            store.get_state(&code).await,
            Err(StoreError::ClassNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_codes_unique_across_many_creates() {
        let store = InMemoryClassStore::default();
        let mut codes = std::collections::HashSet::new();
        for _ in 0..500 {
            let code = store.create_class(Payload::empty()).await.unwrap();
            assert!(codes.insert(code));
        }
        assert_eq!(store.len(), 500);
    }
}
