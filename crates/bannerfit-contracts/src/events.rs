use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use serde_json::{Map, Value};

use crate::summary::now_utc_iso;

pub type EventPayload = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    BatchStarted,
    VariantDispatched,
    VariantSucceeded,
    VariantFailed,
    ModelDiscovery,
    PacingWait,
    BatchFinished,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BatchStarted => "batch_started",
            Self::VariantDispatched => "variant_dispatched",
            Self::VariantSucceeded => "variant_succeeded",
            Self::VariantFailed => "variant_failed",
            Self::ModelDiscovery => "model_discovery",
            Self::PacingWait => "pacing_wait",
            Self::BatchFinished => "batch_finished",
        }
    }
}

/// Append-only `events.jsonl` log for one batch.
///
/// Every line is a compact JSON object with `type`, `batch_id` and `ts`
/// followed by the event payload. Payload keys never replace those three.
#[derive(Debug, Clone)]
pub struct EventLog {
    inner: Arc<EventLogInner>,
}

#[derive(Debug)]
struct EventLogInner {
    path: PathBuf,
    batch_id: String,
    lock: Mutex<()>,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>, batch_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventLogInner {
                path: path.into(),
                batch_id: batch_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn batch_id(&self) -> &str {
        &self.inner.batch_id
    }

    pub fn emit(&self, kind: EventKind, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = payload;
        event.insert("type".to_string(), Value::String(kind.as_str().to_string()));
        event.insert(
            "batch_id".to_string(),
            Value::String(self.inner.batch_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)
            .with_context(|| format!("failed to open {}", self.inner.path.display()))?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }
}

/// Reads back every parseable line of an events file, skipping junk.
pub fn read_events(path: &Path) -> anyhow::Result<Vec<Value>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(raw
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .collect())
}

pub fn event_types(events: &[Value]) -> Vec<String> {
    events
        .iter()
        .filter_map(|row| row.get("type").and_then(Value::as_str).map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn emit_writes_one_compact_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = EventLog::new(&path, "batch-1");

        let mut payload = EventPayload::new();
        payload.insert("ratio".to_string(), json!("16:9"));
        let emitted = log.emit(EventKind::VariantDispatched, payload)?;

        let content = fs::read_to_string(&path)?;
        assert_eq!(content.lines().count(), 1);
        let parsed: Value = serde_json::from_str(content.lines().next().unwrap_or(""))?;
        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], json!("variant_dispatched"));
        assert_eq!(parsed["batch_id"], json!("batch-1"));
        assert_eq!(parsed["ratio"], json!("16:9"));
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn payload_cannot_override_envelope() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let log = EventLog::new(temp.path().join("events.jsonl"), "batch-1");

        let mut payload = EventPayload::new();
        payload.insert("type".to_string(), json!("spoofed"));
        payload.insert("batch_id".to_string(), json!("other"));
        let emitted = log.emit(EventKind::BatchStarted, payload)?;

        assert_eq!(emitted["type"], json!("batch_started"));
        assert_eq!(emitted["batch_id"], json!("batch-1"));
        Ok(())
    }

    #[test]
    fn creates_parent_dirs_and_appends() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("out").join("events.jsonl");
        let log = EventLog::new(&path, "batch-2");

        log.emit(EventKind::BatchStarted, EventPayload::new())?;
        log.emit(EventKind::BatchFinished, EventPayload::new())?;
        fs::write(
            &path,
            fs::read_to_string(&path)? + "not json\n",
        )?;

        let events = read_events(&path)?;
        assert_eq!(
            event_types(&events),
            vec!["batch_started".to_string(), "batch_finished".to_string()]
        );
        Ok(())
    }
}
