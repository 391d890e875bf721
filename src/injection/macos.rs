//! Quartz event injector
//!
//! Posts `CGEvent`s at the HID tap. Needs the Accessibility permission; without
//! it macOS silently drops the events.

use super::{InjectionError, InjectionResult, InputInjector};
use crate::catalog::PhysicalInput;
use core_graphics::event::{CGEvent, CGEventTapLocation, CGEventType, CGKeyCode, CGMouseButton, ScrollEventUnit};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};

#[derive(Debug, Default)]
pub struct CoreGraphicsInjector;

impl CoreGraphicsInjector {
    pub fn new() -> Self {
        Self
    }

    fn source(input: &PhysicalInput) -> InjectionResult<CGEventSource> {
        CGEventSource::new(CGEventSourceStateID::HIDSystemState).map_err(|_| os_error(input, "failed to create event source"))
    }

    fn send_key(&self, input: &PhysicalInput, key_down: bool) -> InjectionResult<()> {
        let keycode = key_code(input).ok_or_else(|| InjectionError::UnmappedInput(input.clone()))?;
        let event = CGEvent::new_keyboard_event(Self::source(input)?, keycode, key_down)
            .map_err(|_| os_error(input, "failed to create keyboard event"))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn send_mouse(&self, input: &PhysicalInput, button: &str, down: bool) -> InjectionResult<()> {
        let source = Self::source(input)?;

        let (event_type, cg_button) = match (button, down) {
            ("left", true) => (CGEventType::LeftMouseDown, CGMouseButton::Left),
            ("left", false) => (CGEventType::LeftMouseUp, CGMouseButton::Left),
            ("right", true) => (CGEventType::RightMouseDown, CGMouseButton::Right),
            ("right", false) => (CGEventType::RightMouseUp, CGMouseButton::Right),
            ("middle", true) => (CGEventType::OtherMouseDown, CGMouseButton::Center),
            ("middle", false) => (CGEventType::OtherMouseUp, CGMouseButton::Center),
            ("scroll_up" | "scroll_down", true) => {
                let delta = if button == "scroll_up" { 1 } else { -1 };
                let event = CGEvent::new_scroll_event(source, ScrollEventUnit::LINE, 1, delta, 0, 0)
                    .map_err(|_| os_error(input, "failed to create scroll event"))?;
                event.post(CGEventTapLocation::HID);
                return Ok(());
            }
            // A wheel notch has no release.
            ("scroll_up" | "scroll_down", false) => return Ok(()),
            _ => return Err(InjectionError::UnmappedInput(input.clone())),
        };

        // Click wherever the cursor currently is.
        let location = CGEvent::new(source.clone())
            .map_err(|_| os_error(input, "failed to read cursor location"))?
            .location();
        let event = CGEvent::new_mouse_event(source, event_type, location, cg_button)
            .map_err(|_| os_error(input, "failed to create mouse event"))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn dispatch(&self, input: &PhysicalInput, down: bool) -> InjectionResult<()> {
        match input {
            PhysicalInput::MouseButton(button) => self.send_mouse(input, button, down),
            PhysicalInput::Key(_) | PhysicalInput::Modifier(_) => self.send_key(input, down),
        }
    }
}

impl InputInjector for CoreGraphicsInjector {
    fn press(&mut self, input: &PhysicalInput) -> InjectionResult<()> {
        self.dispatch(input, true)
    }

    fn release(&mut self, input: &PhysicalInput) -> InjectionResult<()> {
        self.dispatch(input, false)
    }

    fn name(&self) -> &'static str {
        "macos-quartz"
    }
}

fn os_error(input: &PhysicalInput, reason: &str) -> InjectionError {
    InjectionError::Os {
        input: input.clone(),
        reason: reason.to_string(),
    }
}

/// ANSI-layout virtual keycodes (`kVK_*`).
pub fn key_code(input: &PhysicalInput) -> Option<CGKeyCode> {
    let name = match input {
        PhysicalInput::Modifier(name) => {
            return match name.as_str() {
                "shift" => Some(0x38),
                "ctrl" => Some(0x3B),
                "alt" => Some(0x3A),
                _ => None,
            }
        }
        PhysicalInput::Key(name) => name.as_str(),
        PhysicalInput::MouseButton(_) => return None,
    };

    let code = match name {
        "a" => 0x00,
        "s" => 0x01,
        "d" => 0x02,
        "f" => 0x03,
        "h" => 0x04,
        "g" => 0x05,
        "z" => 0x06,
        "x" => 0x07,
        "c" => 0x08,
        "v" => 0x09,
        "b" => 0x0B,
        "q" => 0x0C,
        "w" => 0x0D,
        "e" => 0x0E,
        "r" => 0x0F,
        "y" => 0x10,
        "t" => 0x11,
        "1" => 0x12,
        "2" => 0x13,
        "3" => 0x14,
        "4" => 0x15,
        "6" => 0x16,
        "5" => 0x17,
        "=" => 0x18,
        "9" => 0x19,
        "7" => 0x1A,
        "-" => 0x1B,
        "8" => 0x1C,
        "0" => 0x1D,
        "]" => 0x1E,
        "o" => 0x1F,
        "u" => 0x20,
        "[" => 0x21,
        "i" => 0x22,
        "p" => 0x23,
        "enter" | "return" => 0x24,
        "l" => 0x25,
        "j" => 0x26,
        "'" => 0x27,
        "k" => 0x28,
        ";" => 0x29,
        "\\" => 0x2A,
        "," => 0x2B,
        "/" => 0x2C,
        "n" => 0x2D,
        "m" => 0x2E,
        "." => 0x2F,
        "tab" => 0x30,
        "space" => 0x31,
        "`" => 0x32,
        "backspace" => 0x33,
        "esc" | "escape" => 0x35,
        "cmd" | "win" => 0x37,
        "caps_lock" | "capslock" => 0x39,
        "f5" => 0x60,
        "f6" => 0x61,
        "f7" => 0x62,
        "f3" => 0x63,
        "f8" => 0x64,
        "f9" => 0x65,
        "f11" => 0x67,
        "f10" => 0x6D,
        "f12" => 0x6F,
        "home" => 0x73,
        "page_up" | "pageup" => 0x74,
        "delete" | "del" => 0x75,
        "f4" => 0x76,
        "end" => 0x77,
        "f2" => 0x78,
        "page_down" | "pagedown" => 0x79,
        "f1" => 0x7A,
        "left" => 0x7B,
        "right" => 0x7C,
        "down" => 0x7D,
        "up" => 0x7E,
        _ => return None,
    };
    Some(code)
}
