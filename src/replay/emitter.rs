//! Synthetic input output.
//!
//! `InputEmitter` is the seam between the replay scheduler and the OS.
//! The default implementation drives enigo; on Windows, wheel motion is
//! injected with `SendInput` in raw wheel units instead, because the
//! standard scroll call only moves in whole notches.

use crate::capture::input::keys::resolve_enigo_key;
use crate::capture::input::types::{KeyPayload, MouseButton};
use crate::recorder::error::{RecordingError, RecordingResult};
use enigo::{Axis, Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};

/// Raw wheel units per notch on Windows.
pub const WHEEL_DELTA: f64 = 120.0;

/// Output side of the input adapter.
///
/// Scroll amounts are in emission units (see `scroll_resolution`); positive
/// `dy` scrolls up, positive `dx` scrolls right.
pub trait InputEmitter {
    fn move_to(&mut self, x: i32, y: i32) -> RecordingResult<()>;

    fn button(&mut self, button: MouseButton, pressed: bool) -> RecordingResult<()>;

    fn scroll(&mut self, dx: i32, dy: i32) -> RecordingResult<()>;

    fn key(&mut self, key: &KeyPayload, pressed: bool) -> RecordingResult<()>;

    /// Emission units per recorded wheel unit.
    fn scroll_resolution(&self) -> f64 {
        1.0
    }
}

/// Factory for emitters plus pointer queries.
///
/// Emitters are created on the thread that uses them.
pub trait InputBackend: Send + Sync {
    fn emitter(&self) -> RecordingResult<Box<dyn InputEmitter>>;

    fn cursor_position(&self) -> Option<(i32, i32)>;
}

pub struct EnigoBackend {
    raw_wheel: bool,
}

impl EnigoBackend {
    pub fn new() -> Self {
        Self {
            raw_wheel: cfg!(target_os = "windows"),
        }
    }
}

impl Default for EnigoBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InputBackend for EnigoBackend {
    fn emitter(&self) -> RecordingResult<Box<dyn InputEmitter>> {
        Ok(Box::new(EnigoEmitter::new(self.raw_wheel)?))
    }

    fn cursor_position(&self) -> Option<(i32, i32)> {
        Enigo::new(&Settings::default())
            .ok()
            .and_then(|enigo| enigo.location().ok())
    }
}

pub struct EnigoEmitter {
    enigo: Enigo,
    raw_wheel: bool,
}

impl EnigoEmitter {
    pub fn new(raw_wheel: bool) -> RecordingResult<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| RecordingError::PlatformError(format!("Failed to open input device: {}", e)))?;
        Ok(Self {
            enigo,
            raw_wheel: raw_wheel && cfg!(target_os = "windows"),
        })
    }
}

fn injection_error(e: enigo::InputError) -> RecordingError {
    RecordingError::Injection(e.to_string())
}

fn enigo_button(button: MouseButton) -> Option<enigo::Button> {
    match button {
        MouseButton::Left => Some(enigo::Button::Left),
        MouseButton::Right => Some(enigo::Button::Right),
        MouseButton::Middle => Some(enigo::Button::Middle),
        #[cfg(any(target_os = "windows", all(unix, not(target_os = "macos"))))]
        MouseButton::Back => Some(enigo::Button::Back),
        #[cfg(any(target_os = "windows", all(unix, not(target_os = "macos"))))]
        MouseButton::Forward => Some(enigo::Button::Forward),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

impl InputEmitter for EnigoEmitter {
    fn move_to(&mut self, x: i32, y: i32) -> RecordingResult<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(injection_error)
    }

    fn button(&mut self, button: MouseButton, pressed: bool) -> RecordingResult<()> {
        let target = enigo_button(button).ok_or_else(|| {
            RecordingError::Injection(format!("{:?} button is not supported here", button))
        })?;
        let direction = if pressed { Direction::Press } else { Direction::Release };
        self.enigo.button(target, direction).map_err(injection_error)
    }

    fn scroll(&mut self, dx: i32, dy: i32) -> RecordingResult<()> {
        if self.raw_wheel {
            if dy != 0 {
                send_raw_wheel(dy, false)?;
            }
            if dx != 0 {
                send_raw_wheel(dx, true)?;
            }
            return Ok(());
        }

        // enigo scrolls down / right for positive lengths
        if dy != 0 {
            self.enigo.scroll(-dy, Axis::Vertical).map_err(injection_error)?;
        }
        if dx != 0 {
            self.enigo.scroll(dx, Axis::Horizontal).map_err(injection_error)?;
        }
        Ok(())
    }

    fn key(&mut self, key: &KeyPayload, pressed: bool) -> RecordingResult<()> {
        let target = resolve_enigo_key(key).ok_or_else(|| RecordingError::UnresolvedKey(key.to_string()))?;
        let direction = if pressed { Direction::Press } else { Direction::Release };
        self.enigo.key(target, direction).map_err(injection_error)
    }

    fn scroll_resolution(&self) -> f64 {
        if self.raw_wheel {
            WHEEL_DELTA
        } else {
            1.0
        }
    }
}

/// Inject wheel motion in raw units (120 per notch).
#[cfg(target_os = "windows")]
fn send_raw_wheel(amount: i32, horizontal: bool) -> RecordingResult<()> {
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_HWHEEL, MOUSEEVENTF_WHEEL, MOUSEINPUT,
    };

    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: amount as _,
                dwFlags: if horizontal { MOUSEEVENTF_HWHEEL } else { MOUSEEVENTF_WHEEL },
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };

    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent == 1 {
        Ok(())
    } else {
        Err(RecordingError::Injection(format!(
            "SendInput rejected wheel input ({})",
            std::io::Error::last_os_error()
        )))
    }
}

#[cfg(not(target_os = "windows"))]
fn send_raw_wheel(_amount: i32, _horizontal: bool) -> RecordingResult<()> {
    Err(RecordingError::PlatformError(
        "Raw wheel injection is only available on Windows".to_string(),
    ))
}
