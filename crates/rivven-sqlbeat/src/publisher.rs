//! Event publishers
//!
//! The dispatcher hands every completed event to a `Publisher`. Publishing
//! is fire-once: a failure is reported back to the caller and never retried
//! here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::Event;

/// Destination for completed events
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish one event
    async fn publish(&self, event: Event) -> Result<()>;
}

/// Output format for the stdout publisher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Compact JSON (one line per event)
    #[default]
    Json,
    /// Pretty-printed JSON
    Pretty,
}

/// Writes events to stdout as JSON documents
#[derive(Debug, Clone, Default)]
pub struct StdoutPublisher {
    format: OutputFormat,
}

impl StdoutPublisher {
    /// Create a publisher with the given format
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Encode an event the way it is written
    pub fn encode(&self, event: &Event) -> Result<String> {
        let encoded = match self.format {
            OutputFormat::Json => serde_json::to_string(event)?,
            OutputFormat::Pretty => serde_json::to_string_pretty(event)?,
        };
        Ok(encoded)
    }
}

#[async_trait]
impl Publisher for StdoutPublisher {
    async fn publish(&self, event: Event) -> Result<()> {
        let line = self.encode(&event)?;
        write_line(&line)
            .map_err(|e| Error::publish_with_source("failed to write event to stdout", e))?;
        debug!(fields = event.len(), "event sent");
        Ok(())
    }
}

fn write_line(line: &str) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", line)?;
    out.flush()
}

/// Collects published events in memory
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    events: Mutex<Vec<Event>>,
    failing: AtomicBool,
}

impl MemoryPublisher {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following publish fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Events published so far
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of events published so far
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing was published
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take all events published so far
    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, event: Event) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::publish("publisher unavailable"));
        }
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        Ok(())
    }
}
