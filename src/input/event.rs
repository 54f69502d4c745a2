//! Input event record and its fixed 12-byte encoding

use serde::{Deserialize, Serialize};

use crate::layout::event_fields;

/// Kind of input event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum InputKind {
    KeyDown = 0,
    KeyUp = 1,
    MouseDown = 2,
    MouseUp = 3,
    MouseMove = 4,
}

impl InputKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(InputKind::KeyDown),
            1 => Some(InputKind::KeyUp),
            2 => Some(InputKind::MouseDown),
            3 => Some(InputKind::MouseUp),
            4 => Some(InputKind::MouseMove),
            _ => None,
        }
    }

    pub fn is_key(self) -> bool {
        matches!(self, InputKind::KeyDown | InputKind::KeyUp)
    }
}

/// One discrete input event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub kind: InputKind,
    pub key_code: u8,
    pub mouse_button: u8,
    pub mouse_x: f32,
    pub mouse_y: f32,
}

impl InputEvent {
    pub fn key_down(key_code: u8) -> Self {
        Self::key(InputKind::KeyDown, key_code)
    }

    pub fn key_up(key_code: u8) -> Self {
        Self::key(InputKind::KeyUp, key_code)
    }

    fn key(kind: InputKind, key_code: u8) -> Self {
        Self {
            kind,
            key_code,
            mouse_button: 0,
            mouse_x: 0.0,
            mouse_y: 0.0,
        }
    }

    pub fn mouse_down(button: u8, x: f32, y: f32) -> Self {
        Self::mouse(InputKind::MouseDown, button, x, y)
    }

    pub fn mouse_up(button: u8, x: f32, y: f32) -> Self {
        Self::mouse(InputKind::MouseUp, button, x, y)
    }

    pub fn mouse_move(x: f32, y: f32) -> Self {
        Self::mouse(InputKind::MouseMove, 0, x, y)
    }

    fn mouse(kind: InputKind, mouse_button: u8, mouse_x: f32, mouse_y: f32) -> Self {
        Self {
            kind,
            key_code: 0,
            mouse_button,
            mouse_x,
            mouse_y,
        }
    }

    /// Little-endian record: kind, key code, button, pad, x, y
    pub fn encode(&self) -> [u8; event_fields::BYTES] {
        let mut record = [0u8; event_fields::BYTES];
        record[event_fields::KIND] = self.kind as u8;
        record[event_fields::KEY_CODE] = self.key_code;
        record[event_fields::MOUSE_BUTTON] = self.mouse_button;
        record[event_fields::MOUSE_X..event_fields::MOUSE_X + 4]
            .copy_from_slice(&self.mouse_x.to_le_bytes());
        record[event_fields::MOUSE_Y..event_fields::MOUSE_Y + 4]
            .copy_from_slice(&self.mouse_y.to_le_bytes());
        record
    }

    /// Decode a record; `Err` carries the unknown kind byte
    pub fn decode(record: &[u8; event_fields::BYTES]) -> Result<Self, u8> {
        let kind_byte = record[event_fields::KIND];
        let kind = InputKind::from_u8(kind_byte).ok_or(kind_byte)?;
        let f32_at = |offset: usize| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&record[offset..offset + 4]);
            f32::from_le_bytes(raw)
        };
        Ok(Self {
            kind,
            key_code: record[event_fields::KEY_CODE],
            mouse_button: record[event_fields::MOUSE_BUTTON],
            mouse_x: f32_at(event_fields::MOUSE_X),
            mouse_y: f32_at(event_fields::MOUSE_Y),
        })
    }
}
