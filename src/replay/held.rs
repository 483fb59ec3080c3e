//! Bookkeeping of keys and buttons held down by a replay.
//!
//! If a replay is interrupted between a press and its release, the matching
//! release never runs. Everything still held is released at the end, most
//! recent press first.

use crate::capture::input::types::{KeyPayload, MouseButton};
use crate::replay::emitter::InputEmitter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeldInput {
    Key(KeyPayload),
    Button(MouseButton),
}

/// Outcome of a safety release pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseSummary {
    pub keys: usize,
    pub buttons: usize,
    pub failures: usize,
}

#[derive(Debug, Default)]
pub struct HeldInputs {
    stack: Vec<HeldInput>,
}

impl HeldInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press_key(&mut self, key: KeyPayload) {
        self.stack.push(HeldInput::Key(key));
    }

    pub fn press_button(&mut self, button: MouseButton) {
        self.stack.push(HeldInput::Button(button));
    }

    /// Drop the most recent matching press. Returns `false` if none was held.
    pub fn release_key(&mut self, key: &KeyPayload) -> bool {
        self.remove_last(|held| matches!(held, HeldInput::Key(k) if k == key))
    }

    pub fn release_button(&mut self, button: MouseButton) -> bool {
        self.remove_last(|held| matches!(held, HeldInput::Button(b) if *b == button))
    }

    fn remove_last(&mut self, pred: impl Fn(&HeldInput) -> bool) -> bool {
        match self.stack.iter().rposition(pred) {
            Some(index) => {
                self.stack.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn held(&self) -> &[HeldInput] {
        &self.stack
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Release everything still held, newest first.
    ///
    /// Individual failures are logged and counted; the pass always empties
    /// the stack so a second call releases nothing.
    pub fn release_all(&mut self, emitter: &mut dyn InputEmitter) -> ReleaseSummary {
        let mut summary = ReleaseSummary::default();

        while let Some(held) = self.stack.pop() {
            let result = match &held {
                HeldInput::Key(key) => {
                    summary.keys += 1;
                    emitter.key(key, false)
                }
                HeldInput::Button(button) => {
                    summary.buttons += 1;
                    emitter.button(*button, false)
                }
            };
            if let Err(e) = result {
                summary.failures += 1;
                tracing::warn!("Safety release of {:?} failed: {}", held, e);
            }
        }

        if summary.keys + summary.buttons > 0 {
            tracing::info!(
                "Released {} held keys and {} held buttons",
                summary.keys,
                summary.buttons
            );
        }
        summary
    }
}
