//! Camera pose publication
//!
//! One writer (the client) stores six independent `f32` fields; any number of
//! readers poll them. There is no cross-field atomicity: a reader racing a
//! publish can see a pose mixing two updates. The pose is only used to render
//! the next frame, so a mixed pose is corrected by the next poll.

use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};

use crate::layout::{camera_fields, RegionLayout, Section, SharedBytes};

/// Camera pose
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub zoom: f32,
}

impl CameraState {
    pub fn new(x: f32, y: f32, z: f32, yaw: f32, pitch: f32, zoom: f32) -> Self {
        Self {
            x,
            y,
            z,
            yaw,
            pitch,
            zoom,
        }
    }

    fn fields(&self) -> [(usize, f32); 6] {
        [
            (camera_fields::X, self.x),
            (camera_fields::Y, self.y),
            (camera_fields::Z, self.z),
            (camera_fields::YAW, self.yaw),
            (camera_fields::PITCH, self.pitch),
            (camera_fields::ZOOM, self.zoom),
        ]
    }
}

/// View over the camera section
#[derive(Debug, Clone, Copy)]
pub struct CameraChannel<'a> {
    bytes: &'a SharedBytes,
    base: usize,
}

impl<'a> CameraChannel<'a> {
    pub fn new(bytes: &'a SharedBytes, layout: &RegionLayout) -> Self {
        Self {
            bytes,
            base: layout.window(Section::Camera).offset,
        }
    }

    fn load(&self, field: usize) -> f32 {
        f32::from_bits(self.bytes.atomic_u32(self.base + field).load(Ordering::Acquire))
    }

    /// Publish all six fields, each one independently
    pub fn publish(&self, state: &CameraState) {
        for (field, value) in state.fields() {
            self.bytes
                .atomic_u32(self.base + field)
                .store(value.to_bits(), Ordering::Release);
        }
    }

    /// Best-effort snapshot of the current pose
    pub fn read(&self) -> CameraState {
        CameraState {
            x: self.load(camera_fields::X),
            y: self.load(camera_fields::Y),
            z: self.load(camera_fields::Z),
            yaw: self.load(camera_fields::YAW),
            pitch: self.load(camera_fields::PITCH),
            zoom: self.load(camera_fields::ZOOM),
        }
    }

    pub(crate) fn reset(&self) {
        self.publish(&CameraState::default());
    }
}
