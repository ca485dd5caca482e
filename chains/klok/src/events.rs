//! Operator-facing event stream.
//!
//! The account state machine and driver only emit [`BotEvent`]s; how they are
//! shown is the sink's business.

use core_logic::EVENT_TARGET;
use std::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Info,
    Success,
    Warning,
    Error,
    Custom,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Info => "info",
            EventKind::Success => "success",
            EventKind::Warning => "warning",
            EventKind::Error => "error",
            EventKind::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotEvent {
    /// Zero-based account index, `None` for driver-level events.
    pub account: Option<usize>,
    pub kind: EventKind,
    pub message: String,
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: BotEvent);
}

/// Convenience emitters so call sites stay one line long.
pub trait EventSinkExt: EventSink {
    fn account(&self, index: usize, kind: EventKind, message: impl Into<String>) {
        self.emit(BotEvent {
            account: Some(index),
            kind,
            message: message.into(),
        });
    }

    fn global(&self, kind: EventKind, message: impl Into<String>) {
        self.emit(BotEvent {
            account: None,
            kind,
            message: message.into(),
        });
    }
}

impl<T: EventSink + ?Sized> EventSinkExt for T {}

/// Forwards events to `tracing` under the bot's event target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: BotEvent) {
        let message = match event.account {
            Some(index) => format!("Account {}: {}", index + 1, event.message),
            None => event.message,
        };
        let kind = event.kind.as_str();

        match event.kind {
            EventKind::Info | EventKind::Success | EventKind::Custom => {
                info!(target: EVENT_TARGET, kind, "{}", message)
            }
            EventKind::Warning => warn!(target: EVENT_TARGET, kind, "{}", message),
            EventKind::Error => error!(target: EVENT_TARGET, kind, "{}", message),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<BotEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BotEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: BotEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
