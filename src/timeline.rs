//! Time-triggered events inside a composite.

use crate::composite::CompositeConfig;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// What happens when a [`TimelineEvent`] comes due.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Start a child effect at the root position plus `offset`.
    SpawnChild {
        #[serde(default)]
        name: Option<String>,
        effect: Box<CompositeConfig>,
        #[serde(default)]
        offset: Vec3,
    },
    EnableLayer { layer: String },
    DisableLayer { layer: String },
    /// Append `message` to the composite's notification log.
    Notify { message: String },
}

/// An event scheduled at `time` seconds after the composite starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub time: f32,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl TimelineEvent {
    pub fn new(time: f32, kind: EventKind) -> Self {
        Self { time, kind }
    }

    pub fn notify(time: f32, message: impl Into<String>) -> Self {
        Self::new(
            time,
            EventKind::Notify {
                message: message.into(),
            },
        )
    }
}

/// Time-ordered event queue. Each event fires exactly once.
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
    next: usize,
}

impl Timeline {
    /// Events sharing a time fire in declaration order.
    pub fn new(mut events: Vec<TimelineEvent>) -> Self {
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { events, next: 0 }
    }

    /// Events whose time is at or before `elapsed` and that have not fired.
    pub fn drain_due(&mut self, elapsed: f32) -> &[TimelineEvent] {
        let start = self.next;
        while self.next < self.events.len() && self.events[self.next].time <= elapsed {
            self.next += 1;
        }
        &self.events[start..self.next]
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn pending(&self) -> usize {
        self.events.len() - self.next
    }

    pub fn is_finished(&self) -> bool {
        self.next == self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(events: &[TimelineEvent]) -> Vec<&str> {
        events
            .iter()
            .map(|e| match &e.kind {
                EventKind::Notify { message } => message.as_str(),
                _ => "",
            })
            .collect()
    }

    #[test]
    fn test_fires_in_time_order_once() {
        let mut timeline = Timeline::new(vec![
            TimelineEvent::notify(0.5, "b"),
            TimelineEvent::notify(0.1, "a"),
            TimelineEvent::notify(0.5, "c"),
            TimelineEvent::notify(2.0, "d"),
        ]);
        assert_eq!(messages(timeline.drain_due(0.0)), Vec::<&str>::new());
        assert_eq!(messages(timeline.drain_due(0.6)), vec!["a", "b", "c"]);
        assert!(timeline.drain_due(0.6).is_empty());
        assert_eq!(timeline.pending(), 1);
        assert_eq!(messages(timeline.drain_due(10.0)), vec!["d"]);
        assert!(timeline.is_finished());
    }

    #[test]
    fn test_deserialize_events() {
        let events: Vec<TimelineEvent> = serde_json::from_str(
            r#"[
                { "time": 0.2, "kind": "enable_layer", "layer": "smoke" },
                { "time": 0.4, "kind": "notify", "message": "peak" },
                { "time": 0.6, "kind": "spawn_child", "effect": { "name": "puff" }, "offset": [0, 1, 0] }
            ]"#,
        )
        .unwrap();
        assert_eq!(
            events[0].kind,
            EventKind::EnableLayer {
                layer: "smoke".into()
            }
        );
        match &events[2].kind {
            EventKind::SpawnChild { effect, offset, name } => {
                assert_eq!(effect.name, "puff");
                assert_eq!(*offset, Vec3::Y);
                assert!(name.is_none());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
