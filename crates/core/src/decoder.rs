// crates/core/src/decoder.rs
//! Decoder for the button box's line protocol.
//!
//! The radio receiver prints one message per line:
//!
//! | Line          | Meaning                              |
//! |---------------|--------------------------------------|
//! | `Button: 1`   | button 1 pressed (`Button 1` too)    |
//! | `Heart: 7`    | heartbeat number 7 from the receiver |
//!
//! Numbers are 1-based. The first run of digits in the line is the number;
//! a line with no digits, or that is neither a button nor a heartbeat, is
//! logged and dropped. Nothing in here panics on device input.

use std::sync::OnceLock;

use regex_lite::Regex;

fn digits() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"\d+").expect("static regex"))
}

/// A decoded device line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMessage {
    /// 1-based button number as printed by the device.
    Button(u32),
    Heart(u32),
    Unexpected(String),
}

fn first_number(line: &str) -> Option<u32> {
    digits().find(line).and_then(|m| m.as_str().parse().ok())
}

/// Decode a single line. Surrounding whitespace and line endings are ignored.
pub fn decode_line(line: &str) -> DeviceMessage {
    let line = line.trim();
    let number = first_number(line);
    match number {
        Some(n) if line.contains("Button") => DeviceMessage::Button(n),
        Some(n) if line.contains("Heart") => DeviceMessage::Heart(n),
        _ => DeviceMessage::Unexpected(line.to_string()),
    }
}

pub type ButtonCallback = Box<dyn FnMut() + Send>;
pub type HeartCallback = Box<dyn FnMut(u32) + Send>;

/// What [`EventDecoder::handle_line`] did with a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Callback at this 0-based index ran.
    Button { index: usize },
    /// Button number had no registered callback.
    NoButtonCallback { number: u32 },
    Heartbeat { id: u32 },
    HeartbeatIgnored { id: u32 },
    Unexpected,
}

/// Routes decoded lines to registered callbacks. Slot `i` of the button list
/// handles `Button: i+1`; `None` slots are reserved buttons.
#[derive(Default)]
pub struct EventDecoder {
    buttons: Vec<Option<ButtonCallback>>,
    heart: Option<HeartCallback>,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buttons(mut self, buttons: Vec<Option<ButtonCallback>>) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn with_heartbeat(mut self, heart: HeartCallback) -> Self {
        self.heart = Some(heart);
        self
    }

    pub fn handle_line(&mut self, line: &str) -> Dispatch {
        match decode_line(line) {
            DeviceMessage::Button(number) => self.dispatch_button(number),
            DeviceMessage::Heart(id) => match self.heart.as_mut() {
                Some(cb) => {
                    tracing::trace!(id, "Radio heartbeat");
                    cb(id);
                    Dispatch::Heartbeat { id }
                }
                None => Dispatch::HeartbeatIgnored { id },
            },
            DeviceMessage::Unexpected(raw) => {
                tracing::warn!(line = %raw, "Unexpected device data");
                Dispatch::Unexpected
            }
        }
    }

    fn dispatch_button(&mut self, number: u32) -> Dispatch {
        let slot = (number as usize)
            .checked_sub(1)
            .and_then(|index| self.buttons.get_mut(index).map(|cb| (index, cb)));
        match slot {
            Some((index, Some(cb))) => {
                cb();
                Dispatch::Button { index }
            }
            _ => {
                tracing::warn!(button = number, "No callback registered for button");
                Dispatch::NoButtonCallback { number }
            }
        }
    }
}
