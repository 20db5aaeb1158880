use std::path::Path;

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::variants::{BatchResult, VariantResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub requested: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub variants: Vec<Map<String, Value>>,
}

impl BatchSummary {
    /// `files` is matched to `batch.variants` by position; `None` means no
    /// file was written for that variant.
    pub fn from_batch(
        batch_id: impl Into<String>,
        started_at: impl Into<String>,
        finished_at: impl Into<String>,
        batch: &BatchResult,
        files: &[Option<String>],
    ) -> Self {
        let variants = batch
            .iter()
            .enumerate()
            .map(|(idx, variant)| variant_row(variant, files.get(idx).cloned().flatten()))
            .collect();
        Self {
            batch_id: batch_id.into(),
            started_at: started_at.into(),
            finished_at: finished_at.into(),
            requested: batch.len() as u64,
            succeeded: batch.succeeded() as u64,
            failed: batch.failed() as u64,
            variants,
        }
    }
}

fn variant_row(variant: &VariantResult, file: Option<String>) -> Map<String, Value> {
    let mut row = Map::new();
    row.insert("id".to_string(), Value::String(variant.id().to_string()));
    row.insert(
        "ratio".to_string(),
        Value::String(variant.ratio().as_str().to_string()),
    );
    match variant {
        VariantResult::Success { .. } => {
            row.insert("status".to_string(), Value::String("success".to_string()));
            if let Some(file) = file {
                row.insert("file".to_string(), Value::String(file));
            }
        }
        VariantResult::Failure {
            kind,
            message,
            discovery,
            ..
        } => {
            row.insert("status".to_string(), Value::String("failure".to_string()));
            row.insert("kind".to_string(), Value::String(kind.as_str().to_string()));
            row.insert("message".to_string(), Value::String(message.clone()));
            if let Some(discovery) = discovery {
                if let Ok(value) = serde_json::to_value(discovery) {
                    row.insert("discovery".to_string(), value);
                }
            }
        }
    }
    row
}

pub fn write_summary(
    path: &Path,
    summary: &BatchSummary,
    extra: Option<&Map<String, Value>>,
) -> anyhow::Result<()> {
    let mut payload = match serde_json::to_value(summary)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert("ts".to_string(), Value::String(now_utc_iso()));
    if let Some(extra) = extra {
        for (key, value) in extra {
            payload.insert(key.clone(), value.clone());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
