// Per-Event JSONL Recorder
// One JSON line per subscriber event, for downstream spend ranking and audit

use serde::Serialize;
use price_lab::Event;
use std::io::Write;

#[derive(Debug, Serialize)]
pub struct EventRow {
    pub seq: u64,
    pub subscriber_id: String,
    pub arm: String,
    pub price: String,
    pub day: u32,
    pub revenue: f64,
    pub churned: bool,
}

impl EventRow {
    pub fn from_event(event: &Event) -> Self {
        Self {
            seq: event.seq,
            subscriber_id: event.subscriber_id.clone(),
            arm: event.arm.clone(),
            price: event.price.0.to_string(),
            day: event.day,
            revenue: event.revenue,
            churned: event.churned,
        }
    }
}

/// Accumulates event rows and writes them as JSONL.
#[derive(Default)]
pub struct EventLogRecorder {
    rows: Vec<EventRow>,
}

impl EventLogRecorder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn record_all(&mut self, events: &[Event]) {
        self.rows.extend(events.iter().map(EventRow::from_event));
    }

    /// Write all rows to a JSONL file
    pub fn write_jsonl(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(path)?;
        for row in &self.rows {
            let line = serde_json::to_string(row)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
