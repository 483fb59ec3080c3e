//! Translation between platform key identifiers and stored key payloads.
//!
//! Capture maps `rdev::Key` deterministically (press and release of the same
//! physical key always yield the same payload, since rdev only reports a
//! character name on press). Replay resolves payloads to `enigo::Key`.

use crate::capture::input::types::KeyPayload;

/// The reserved cancel key. Never recorded.
pub fn is_cancel_key(key: &rdev::Key) -> bool {
    matches!(key, rdev::Key::Escape)
}

/// Map a captured key to its stored payload.
pub fn payload_from_rdev(key: &rdev::Key) -> KeyPayload {
    if let Some(name) = special_name(key) {
        return KeyPayload::special(name);
    }
    if let Some(ch) = literal_char(key) {
        return KeyPayload::char(ch);
    }
    match key {
        rdev::Key::Unknown(code) => KeyPayload::vk(*code),
        other => KeyPayload::special(format!("{:?}", other).to_lowercase()),
    }
}

/// Resolve a stored payload to a key enigo can synthesize.
pub fn resolve_enigo_key(payload: &KeyPayload) -> Option<enigo::Key> {
    match payload {
        KeyPayload::Special { name } => named_enigo_key(name),
        KeyPayload::Char { ch } if !ch.is_control() => Some(enigo::Key::Unicode(*ch)),
        KeyPayload::Char { .. } => None,
        KeyPayload::Vk { vk } => Some(enigo::Key::Other(*vk)),
    }
}

fn special_name(key: &rdev::Key) -> Option<&'static str> {
    use rdev::Key::*;
    let name = match key {
        Alt => "alt",
        AltGr => "alt_gr",
        Backspace => "backspace",
        CapsLock => "caps_lock",
        ControlLeft => "ctrl_l",
        ControlRight => "ctrl_r",
        Delete => "delete",
        DownArrow => "down",
        End => "end",
        Escape => "esc",
        F1 => "f1",
        F2 => "f2",
        F3 => "f3",
        F4 => "f4",
        F5 => "f5",
        F6 => "f6",
        F7 => "f7",
        F8 => "f8",
        F9 => "f9",
        F10 => "f10",
        F11 => "f11",
        F12 => "f12",
        Home => "home",
        LeftArrow => "left",
        MetaLeft => "cmd",
        MetaRight => "cmd_r",
        PageDown => "page_down",
        PageUp => "page_up",
        Return => "enter",
        KpReturn => "kp_enter",
        RightArrow => "right",
        ShiftLeft => "shift",
        ShiftRight => "shift_r",
        Space => "space",
        Tab => "tab",
        UpArrow => "up",
        PrintScreen => "print_screen",
        ScrollLock => "scroll_lock",
        Pause => "pause",
        NumLock => "num_lock",
        Insert => "insert",
        Function => "fn",
        _ => return None,
    };
    Some(name)
}

fn literal_char(key: &rdev::Key) -> Option<char> {
    use rdev::Key::*;
    let ch = match key {
        KeyA => 'a',
        KeyB => 'b',
        KeyC => 'c',
        KeyD => 'd',
        KeyE => 'e',
        KeyF => 'f',
        KeyG => 'g',
        KeyH => 'h',
        KeyI => 'i',
        KeyJ => 'j',
        KeyK => 'k',
        KeyL => 'l',
        KeyM => 'm',
        KeyN => 'n',
        KeyO => 'o',
        KeyP => 'p',
        KeyQ => 'q',
        KeyR => 'r',
        KeyS => 's',
        KeyT => 't',
        KeyU => 'u',
        KeyV => 'v',
        KeyW => 'w',
        KeyX => 'x',
        KeyY => 'y',
        KeyZ => 'z',
        Num0 | Kp0 => '0',
        Num1 | Kp1 => '1',
        Num2 | Kp2 => '2',
        Num3 | Kp3 => '3',
        Num4 | Kp4 => '4',
        Num5 | Kp5 => '5',
        Num6 | Kp6 => '6',
        Num7 | Kp7 => '7',
        Num8 | Kp8 => '8',
        Num9 | Kp9 => '9',
        BackQuote => '`',
        Minus | KpMinus => '-',
        Equal => '=',
        LeftBracket => '[',
        RightBracket => ']',
        SemiColon => ';',
        Quote => '\'',
        BackSlash | IntlBackslash => '\\',
        Comma => ',',
        Dot | KpDelete => '.',
        Slash | KpDivide => '/',
        KpPlus => '+',
        KpMultiply => '*',
        _ => return None,
    };
    Some(ch)
}

fn named_enigo_key(name: &str) -> Option<enigo::Key> {
    use enigo::Key;
    let key = match name {
        "alt" => Key::Alt,
        "backspace" => Key::Backspace,
        "caps_lock" => Key::CapsLock,
        "ctrl" => Key::Control,
        "ctrl_l" => Key::LControl,
        "ctrl_r" => Key::RControl,
        "delete" => Key::Delete,
        "down" => Key::DownArrow,
        "end" => Key::End,
        "esc" => Key::Escape,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        "home" => Key::Home,
        "left" => Key::LeftArrow,
        "cmd" | "cmd_l" => Key::Meta,
        "page_down" => Key::PageDown,
        "page_up" => Key::PageUp,
        "enter" | "kp_enter" => Key::Return,
        "right" => Key::RightArrow,
        "shift" | "shift_l" => Key::Shift,
        "shift_r" => Key::RShift,
        "space" => Key::Space,
        "tab" => Key::Tab,
        "up" => Key::UpArrow,
        other => return platform_enigo_key(other),
    };
    Some(key)
}

/// Keys whose enigo variant differs per platform.
#[cfg(target_os = "windows")]
fn platform_enigo_key(name: &str) -> Option<enigo::Key> {
    use enigo::Key;
    let key = match name {
        "alt_gr" => Key::RMenu,
        "cmd_r" => Key::RWin,
        "insert" => Key::Insert,
        "num_lock" => Key::Numlock,
        "pause" => Key::Pause,
        "print_screen" => Key::Snapshot,
        "scroll_lock" => Key::Scroll,
        _ => return None,
    };
    Some(key)
}

#[cfg(target_os = "macos")]
fn platform_enigo_key(name: &str) -> Option<enigo::Key> {
    use enigo::Key;
    // Apple keyboards put Help, F13, F14, F15 and Clear where PC keyboards
    // have Insert, Print Screen, Scroll Lock, Pause and Num Lock.
    let key = match name {
        "alt_gr" => Key::ROption,
        "cmd_r" => Key::RCommand,
        "fn" => Key::Function,
        "insert" => Key::Help,
        "num_lock" => Key::Other(KVK_ANSI_KEYPAD_CLEAR),
        "pause" => Key::F15,
        "print_screen" => Key::F13,
        "scroll_lock" => Key::F14,
        _ => return None,
    };
    Some(key)
}

#[cfg(target_os = "macos")]
const KVK_ANSI_KEYPAD_CLEAR: u32 = 0x47;

#[cfg(all(unix, not(target_os = "macos")))]
fn platform_enigo_key(name: &str) -> Option<enigo::Key> {
    use enigo::Key;
    let key = match name {
        "alt_gr" => Key::Other(XK_ISO_LEVEL3_SHIFT),
        "cmd_r" => Key::Other(XK_SUPER_R),
        "insert" => Key::Insert,
        "num_lock" => Key::Numlock,
        "pause" => Key::Pause,
        "print_screen" => Key::Print,
        "scroll_lock" => Key::ScrollLock,
        _ => return None,
    };
    Some(key)
}

#[cfg(all(unix, not(target_os = "macos")))]
const XK_ISO_LEVEL3_SHIFT: u32 = 0xfe03;
#[cfg(all(unix, not(target_os = "macos")))]
const XK_SUPER_R: u32 = 0xffec;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_keys_map_to_special() {
        assert_eq!(payload_from_rdev(&rdev::Key::ShiftLeft), KeyPayload::special("shift"));
        assert_eq!(payload_from_rdev(&rdev::Key::Return), KeyPayload::special("enter"));
        assert_eq!(payload_from_rdev(&rdev::Key::F5), KeyPayload::special("f5"));
    }

    #[test]
    fn test_character_keys_map_to_char() {
        assert_eq!(payload_from_rdev(&rdev::Key::KeyA), KeyPayload::char('a'));
        assert_eq!(payload_from_rdev(&rdev::Key::Num7), KeyPayload::char('7'));
        assert_eq!(payload_from_rdev(&rdev::Key::Slash), KeyPayload::char('/'));
    }

    #[test]
    fn test_unknown_keys_map_to_vk() {
        assert_eq!(payload_from_rdev(&rdev::Key::Unknown(173)), KeyPayload::vk(173));
    }

    #[test]
    fn test_escape_is_the_cancel_key() {
        assert!(is_cancel_key(&rdev::Key::Escape));
        assert!(!is_cancel_key(&rdev::Key::KeyQ));
    }

    #[test]
    fn test_resolve_for_replay() {
        assert_eq!(
            resolve_enigo_key(&KeyPayload::special("shift_r")),
            Some(enigo::Key::RShift)
        );
        assert_eq!(
            resolve_enigo_key(&KeyPayload::special("ctrl_r")),
            Some(enigo::Key::RControl)
        );
        assert_eq!(
            resolve_enigo_key(&KeyPayload::char('x')),
            Some(enigo::Key::Unicode('x'))
        );
        assert_eq!(resolve_enigo_key(&KeyPayload::vk(65)), Some(enigo::Key::Other(65)));
        assert_eq!(resolve_enigo_key(&KeyPayload::special("hyper")), None);
        assert_eq!(resolve_enigo_key(&KeyPayload::char('\u{7}')), None);
    }

    fn all_keys() -> Vec<rdev::Key> {
        use rdev::Key::*;
        vec![
            Alt, AltGr, Backspace, CapsLock, ControlLeft, ControlRight, Delete, DownArrow, End,
            Escape, F1, F10, F11, F12, F2, F3, F4, F5, F6, F7, F8, F9, Home, LeftArrow, MetaLeft,
            MetaRight, PageDown, PageUp, Return, RightArrow, ShiftLeft, ShiftRight, Space, Tab,
            UpArrow, PrintScreen, ScrollLock, Pause, NumLock, BackQuote, Num1, Num2, Num3, Num4,
            Num5, Num6, Num7, Num8, Num9, Num0, Minus, Equal, KeyQ, KeyW, KeyE, KeyR, KeyT, KeyY,
            KeyU, KeyI, KeyO, KeyP, LeftBracket, RightBracket, KeyA, KeyS, KeyD, KeyF, KeyG, KeyH,
            KeyJ, KeyK, KeyL, SemiColon, Quote, BackSlash, IntlBackslash, KeyZ, KeyX, KeyC, KeyV,
            KeyB, KeyN, KeyM, Comma, Dot, Slash, Insert, KpReturn, KpMinus, KpPlus, KpMultiply,
            KpDivide, Kp0, Kp1, Kp2, Kp3, Kp4, Kp5, Kp6, Kp7, Kp8, Kp9, KpDelete, Function,
            Unknown(173),
        ]
    }

    #[test]
    fn test_every_captured_key_can_be_replayed() {
        // Fn is handled by keyboard firmware outside macOS; nothing can synthesize it.
        let unsupported: &[rdev::Key] = if cfg!(target_os = "macos") {
            &[]
        } else {
            &[rdev::Key::Function]
        };

        for key in &all_keys() {
            let payload = payload_from_rdev(key);
            if unsupported.contains(key) {
                continue;
            }
            assert!(
                resolve_enigo_key(&payload).is_some(),
                "{:?} -> {:?} has no replay key",
                key,
                payload
            );
        }
    }

    #[test]
    fn test_right_hand_modifiers_stay_distinct() {
        let left = resolve_enigo_key(&payload_from_rdev(&rdev::Key::ControlLeft));
        let right = resolve_enigo_key(&payload_from_rdev(&rdev::Key::ControlRight));
        assert_ne!(left, right);
        let left = resolve_enigo_key(&payload_from_rdev(&rdev::Key::ShiftLeft));
        let right = resolve_enigo_key(&payload_from_rdev(&rdev::Key::ShiftRight));
        assert_ne!(left, right);
    }
}
