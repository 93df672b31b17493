//! Viewer event bus

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::broadcast;

/// Identifies the viewer that emitted an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewerId(uuid::Uuid);

impl ViewerId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Preset scale modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scale {
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "page-actual")]
    PageActual,
    #[serde(rename = "page-fit")]
    PageFit,
    #[serde(rename = "page-width")]
    PageWidth,
}

impl Scale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scale::Auto => "auto",
            Scale::PageActual => "page-actual",
            Scale::PageFit => "page-fit",
            Scale::PageWidth => "page-width",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Scale::Auto),
            "page-actual" => Ok(Scale::PageActual),
            "page-fit" => Ok(Scale::PageFit),
            "page-width" => Ok(Scale::PageWidth),
            other => Err(format!("Unknown scale preset: {}", other)),
        }
    }
}

/// Events emitted by a viewer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ViewerEvent {
    /// All pages of a newly set document are known
    #[serde(rename = "pagesloaded", rename_all = "camelCase")]
    PagesLoaded { source: ViewerId, pages_count: u32 },
    /// The current page is about to change
    #[serde(rename = "pagechanging", rename_all = "camelCase")]
    PageChanging {
        source: ViewerId,
        page_number: u32,
        page_label: Option<String>,
        previous: u32,
    },
    /// The current scale is about to change; `preset_value` is set when a preset was requested
    #[serde(rename = "scalechanging", rename_all = "camelCase")]
    ScaleChanging {
        source: ViewerId,
        scale: f32,
        preset_value: Option<Scale>,
    },
}

impl ViewerEvent {
    pub fn source(&self) -> ViewerId {
        match self {
            ViewerEvent::PagesLoaded { source, .. }
            | ViewerEvent::PageChanging { source, .. }
            | ViewerEvent::ScaleChanging { source, .. } => *source,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ViewerEvent::PagesLoaded { .. } => "pagesloaded",
            ViewerEvent::PageChanging { .. } => "pagechanging",
            ViewerEvent::ScaleChanging { .. } => "scalechanging",
        }
    }
}

const DEFAULT_CAPACITY: usize = 64;

/// Publish/subscribe channel between a viewer and its host
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ViewerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Slow subscribers lag once more than `capacity` events are pending
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewerEvent> {
        self.sender.subscribe()
    }

    /// Deliver `event` to current subscribers; returns how many received it
    pub fn dispatch(&self, event: ViewerEvent) -> usize {
        tracing::debug!(event = event.name(), source = %event.source(), "dispatch");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Whether both handles refer to the same channel
    pub fn same_channel(&self, other: &EventBus) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
