use serde::{Deserialize, Deserializer, Serialize};

/// Mouse button recorded with a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    /// Side button (X1)
    Back,
    /// Side button (X2)
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAction {
    Press,
    Release,
}

/// A key as stored on disk: a discriminant plus one value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum KeyPayload {
    /// Named key without a character, e.g. `shift`, `enter`, `f5`
    Special { name: String },
    /// Key that produces a literal character
    Char {
        #[serde(rename = "char")]
        ch: char,
    },
    /// Raw platform key code
    Vk { vk: u32 },
}

impl KeyPayload {
    pub fn special(name: impl Into<String>) -> Self {
        KeyPayload::Special { name: name.into() }
    }

    pub fn char(ch: char) -> Self {
        KeyPayload::Char { ch }
    }

    pub fn vk(vk: u32) -> Self {
        KeyPayload::Vk { vk }
    }
}

impl std::fmt::Display for KeyPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPayload::Special { name } => write!(f, "special:{}", name),
            KeyPayload::Char { ch } => write!(f, "char:{:?}", ch),
            KeyPayload::Vk { vk } => write!(f, "vk:{}", vk),
        }
    }
}

/// One recorded input event. `time` is seconds since recording start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputEvent {
    Move {
        time: f64,
        x: i32,
        y: i32,
    },
    Click {
        time: f64,
        x: i32,
        y: i32,
        button: MouseButton,
        pressed: bool,
    },
    Scroll {
        time: f64,
        x: i32,
        y: i32,
        dx: f64,
        dy: f64,
    },
    Key {
        time: f64,
        action: KeyAction,
        /// `None` when the stored payload could not be understood
        #[serde(default, deserialize_with = "lenient_key")]
        key: Option<KeyPayload>,
    },
}

impl InputEvent {
    pub fn time(&self) -> f64 {
        match self {
            InputEvent::Move { time, .. }
            | InputEvent::Click { time, .. }
            | InputEvent::Scroll { time, .. }
            | InputEvent::Key { time, .. } => *time,
        }
    }

    /// Pointer position carried by the event, if any.
    pub fn position(&self) -> Option<(i32, i32)> {
        match self {
            InputEvent::Move { x, y, .. }
            | InputEvent::Click { x, y, .. }
            | InputEvent::Scroll { x, y, .. } => Some((*x, *y)),
            InputEvent::Key { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InputEvent::Move { .. } => "move",
            InputEvent::Click { .. } => "click",
            InputEvent::Scroll { .. } => "scroll",
            InputEvent::Key { .. } => "key",
        }
    }
}

fn lenient_key<'de, D>(deserializer: D) -> Result<Option<KeyPayload>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_payload_wire_format() {
        let special = serde_json::to_value(KeyPayload::special("shift")).unwrap();
        assert_eq!(special, serde_json::json!({"kind": "special", "name": "shift"}));

        let ch = serde_json::to_value(KeyPayload::char('a')).unwrap();
        assert_eq!(ch, serde_json::json!({"kind": "char", "char": "a"}));

        let vk = serde_json::to_value(KeyPayload::vk(173)).unwrap();
        assert_eq!(vk, serde_json::json!({"kind": "vk", "vk": 173}));
    }

    #[test]
    fn test_event_wire_format() {
        let event = InputEvent::Click {
            time: 0.25,
            x: 10,
            y: 20,
            button: MouseButton::Left,
            pressed: true,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "click");
        assert_eq!(value["button"], "left");
        assert_eq!(value["pressed"], true);
        assert_eq!(value["time"], 0.25);
    }

    #[test]
    fn test_unresolvable_key_payload_becomes_none() {
        let raw = r#"{"type":"key","time":1.0,"action":"press","key":{"kind":"char","char":"ab"}}"#;
        let event: InputEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            InputEvent::Key {
                time: 1.0,
                action: KeyAction::Press,
                key: None
            }
        );

        let raw = r#"{"type":"key","time":1.0,"action":"release","key":{"kind":"scancode","v":3}}"#;
        let event: InputEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(event, InputEvent::Key { key: None, .. }));
    }

    #[test]
    fn test_extra_fields_are_tolerated() {
        let raw = r#"{"type":"move","time":0.5,"x":3,"y":4,"screen":"primary"}"#;
        let event: InputEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event, InputEvent::Move { time: 0.5, x: 3, y: 4 });
    }

    #[test]
    fn test_position_and_time_accessors() {
        let key = InputEvent::Key {
            time: 2.0,
            action: KeyAction::Release,
            key: Some(KeyPayload::special("enter")),
        };
        assert_eq!(key.position(), None);
        assert_eq!(key.time(), 2.0);
        assert_eq!(key.kind(), "key");

        let scroll = InputEvent::Scroll {
            time: 1.5,
            x: 7,
            y: 8,
            dx: 0.0,
            dy: -0.5,
        };
        assert_eq!(scroll.position(), Some((7, 8)));
    }
}
