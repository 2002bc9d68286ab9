//! User activity detection.
//!
//! This module provides:
//! - [`ActivityKind`]: the fixed set of interactions that count as activity
//! - [`ActivitySource`]: where listeners are registered (the document)
//! - [`EventTarget`]: an in-process source that dispatches synthetic events
//! - [`Throttle`] and [`ActivityMonitor`]: rate-limited activity reporting

mod monitor;
mod source;

pub use monitor::{ActivityHandler, ActivityMonitor, Throttle};
pub use source::{ActivityListener, ActivitySource, EventTarget, ListenerId, ListenerPhase};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Interactions that reset the inactivity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Pointer moved
    PointerMove,
    /// Key pressed
    KeyDown,
    /// Click
    Click,
    /// Scroll
    Scroll,
    /// Touch started
    TouchStart,
}

impl ActivityKind {
    /// Every kind the monitor listens for.
    pub const ALL: [ActivityKind; 5] = [
        ActivityKind::PointerMove,
        ActivityKind::KeyDown,
        ActivityKind::Click,
        ActivityKind::Scroll,
        ActivityKind::TouchStart,
    ];

    /// Returns the DOM event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::PointerMove => "mousemove",
            ActivityKind::KeyDown => "keydown",
            ActivityKind::Click => "click",
            ActivityKind::Scroll => "scroll",
            ActivityKind::TouchStart => "touchstart",
        }
    }

    /// Parses a DOM event name.
    pub fn from_event_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(ActivityKind::PointerMove.as_str(), "mousemove");
        assert_eq!(ActivityKind::KeyDown.as_str(), "keydown");
        assert_eq!(ActivityKind::Click.as_str(), "click");
        assert_eq!(ActivityKind::Scroll.as_str(), "scroll");
        assert_eq!(ActivityKind::TouchStart.as_str(), "touchstart");
    }

    #[test]
    fn test_from_event_name() {
        for kind in ActivityKind::ALL {
            assert_eq!(ActivityKind::from_event_name(kind.as_str()), Some(kind));
        }
        assert_eq!(ActivityKind::from_event_name("wheel"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ActivityKind::Scroll), "scroll");
    }
}
