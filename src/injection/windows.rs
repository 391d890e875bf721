//! `SendInput`-based injector

use super::{InjectionError, InjectionResult, InputInjector};
use crate::catalog::PhysicalInput;
use std::mem;
use ::windows::Win32::UI::Input::KeyboardAndMouse::*;

const WHEEL_DELTA: i32 = 120;
const XBUTTON1: i32 = 0x0001;
const XBUTTON2: i32 = 0x0002;

#[derive(Debug, Default)]
pub struct SendInputInjector;

impl SendInputInjector {
    pub fn new() -> Self {
        Self
    }

    fn send_key(&self, input: &PhysicalInput, key_up: bool) -> InjectionResult<()> {
        let vk = virtual_key(input).ok_or_else(|| InjectionError::UnmappedInput(input.clone()))?;
        let mut flags = if is_extended_key(vk) {
            KEYEVENTF_EXTENDEDKEY
        } else {
            KEYBD_EVENT_FLAGS(0)
        };
        if key_up {
            flags |= KEYEVENTF_KEYUP;
        }

        let event = INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: vk,
                    wScan: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };
        send(input, &[event])
    }

    fn send_mouse(&self, input: &PhysicalInput, button: &str, up: bool) -> InjectionResult<()> {
        let (flags, data) = match (button, up) {
            ("left", false) => (MOUSEEVENTF_LEFTDOWN, 0),
            ("left", true) => (MOUSEEVENTF_LEFTUP, 0),
            ("right", false) => (MOUSEEVENTF_RIGHTDOWN, 0),
            ("right", true) => (MOUSEEVENTF_RIGHTUP, 0),
            ("middle", false) => (MOUSEEVENTF_MIDDLEDOWN, 0),
            ("middle", true) => (MOUSEEVENTF_MIDDLEUP, 0),
            ("x1", false) => (MOUSEEVENTF_XDOWN, XBUTTON1),
            ("x1", true) => (MOUSEEVENTF_XUP, XBUTTON1),
            ("x2", false) => (MOUSEEVENTF_XDOWN, XBUTTON2),
            ("x2", true) => (MOUSEEVENTF_XUP, XBUTTON2),
            // A wheel notch has no release.
            ("scroll_up", false) => (MOUSEEVENTF_WHEEL, WHEEL_DELTA),
            ("scroll_down", false) => (MOUSEEVENTF_WHEEL, -WHEEL_DELTA),
            ("scroll_up" | "scroll_down", true) => return Ok(()),
            _ => return Err(InjectionError::UnmappedInput(input.clone())),
        };

        let event = INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx: 0,
                    dy: 0,
                    mouseData: data as _,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };
        send(input, &[event])
    }

    fn dispatch(&self, input: &PhysicalInput, up: bool) -> InjectionResult<()> {
        match input {
            PhysicalInput::MouseButton(button) => self.send_mouse(input, button, up),
            PhysicalInput::Key(_) | PhysicalInput::Modifier(_) => self.send_key(input, up),
        }
    }
}

impl InputInjector for SendInputInjector {
    fn press(&mut self, input: &PhysicalInput) -> InjectionResult<()> {
        self.dispatch(input, false)
    }

    fn release(&mut self, input: &PhysicalInput) -> InjectionResult<()> {
        self.dispatch(input, true)
    }

    fn name(&self) -> &'static str {
        "windows-sendinput"
    }
}

fn send(input: &PhysicalInput, events: &[INPUT]) -> InjectionResult<()> {
    let sent = unsafe { SendInput(events, mem::size_of::<INPUT>() as i32) };
    if sent as usize != events.len() {
        return Err(InjectionError::Os {
            input: input.clone(),
            reason: format!(
                "SendInput accepted {} of {} event(s): {}",
                sent,
                events.len(),
                ::windows::core::Error::from_win32()
            ),
        });
    }
    Ok(())
}

pub fn virtual_key(input: &PhysicalInput) -> Option<VIRTUAL_KEY> {
    match input {
        PhysicalInput::Modifier(name) => match name.as_str() {
            "shift" => Some(VK_SHIFT),
            "ctrl" => Some(VK_CONTROL),
            "alt" => Some(VK_MENU),
            _ => None,
        },
        PhysicalInput::Key(name) => key_to_vk(name),
        PhysicalInput::MouseButton(_) => None,
    }
}

fn key_to_vk(name: &str) -> Option<VIRTUAL_KEY> {
    if let [c] = name.as_bytes() {
        if c.is_ascii_alphanumeric() {
            return Some(VIRTUAL_KEY(c.to_ascii_uppercase() as u16));
        }
    }

    let vk = match name {
        "f1" => VK_F1,
        "f2" => VK_F2,
        "f3" => VK_F3,
        "f4" => VK_F4,
        "f5" => VK_F5,
        "f6" => VK_F6,
        "f7" => VK_F7,
        "f8" => VK_F8,
        "f9" => VK_F9,
        "f10" => VK_F10,
        "f11" => VK_F11,
        "f12" => VK_F12,
        "enter" | "return" => VK_RETURN,
        "tab" => VK_TAB,
        "esc" | "escape" => VK_ESCAPE,
        "space" => VK_SPACE,
        "backspace" => VK_BACK,
        "delete" | "del" => VK_DELETE,
        "insert" => VK_INSERT,
        "home" => VK_HOME,
        "end" => VK_END,
        "page_up" | "pageup" => VK_PRIOR,
        "page_down" | "pagedown" => VK_NEXT,
        "up" => VK_UP,
        "down" => VK_DOWN,
        "left" => VK_LEFT,
        "right" => VK_RIGHT,
        "caps_lock" | "capslock" => VK_CAPITAL,
        "cmd" | "win" => VK_LWIN,
        ";" => VK_OEM_1,
        "=" => VK_OEM_PLUS,
        "," => VK_OEM_COMMA,
        "-" => VK_OEM_MINUS,
        "." => VK_OEM_PERIOD,
        "/" => VK_OEM_2,
        "`" => VK_OEM_3,
        "[" => VK_OEM_4,
        "\\" => VK_OEM_5,
        "]" => VK_OEM_6,
        "'" => VK_OEM_7,
        _ => return None,
    };
    Some(vk)
}

fn is_extended_key(vk: VIRTUAL_KEY) -> bool {
    matches!(
        vk,
        VK_UP | VK_DOWN | VK_LEFT | VK_RIGHT | VK_INSERT | VK_DELETE | VK_HOME | VK_END | VK_PRIOR | VK_NEXT | VK_LWIN
    )
}
