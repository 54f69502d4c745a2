//! Consumer side of the frame channel

use super::{Frame, FrameChannel, FrameStats};
use crate::handle::RoleGuard;

/// The single frame reader of a region
#[derive(Debug)]
pub struct FrameConsumer<'a> {
    channel: FrameChannel<'a>,
    last_seen: u64,
    stats: FrameStats,
    _role: RoleGuard<'a>,
}

impl<'a> FrameConsumer<'a> {
    pub(crate) fn new(channel: FrameChannel<'a>, role: RoleGuard<'a>) -> Self {
        Self {
            channel,
            last_seen: 0,
            stats: FrameStats::default(),
            _role: role,
        }
    }

    /// Non-blocking poll for a frame newer than the last one returned
    pub fn poll(&mut self) -> Option<Frame> {
        let mut frame = Frame::default();
        self.poll_into(&mut frame).then_some(frame)
    }

    /// Like [`poll`](Self::poll), reusing the buffers of `frame`.
    ///
    /// Returns `false` and leaves `frame` untouched when there is no new
    /// frame. A frame overwritten while it was being copied is discarded
    /// (counted as a torn read) and `frame` holds partial data; callers
    /// should only look at `frame` after a `true` return.
    pub fn poll_into(&mut self, frame: &mut Frame) -> bool {
        let index = self.channel.active_index();
        let slot = self.channel.slot(index);

        if !slot.is_ready() {
            self.stats.empty_polls += 1;
            return false;
        }

        let frame_id = slot.frame_id();
        if frame_id == 0 || frame_id <= self.last_seen {
            self.stats.empty_polls += 1;
            return false;
        }

        let (scene_len, ui_len) = slot.lengths();
        let capacities = self.channel.capacities();
        if scene_len > capacities.scene || ui_len > capacities.ui {
            // Lengths only go out of range mid-overwrite by a foreign writer.
            self.stats.torn_reads += 1;
            log::warn!(
                "slot {} announced frame {} with out-of-range lengths {}/{}",
                index,
                frame_id,
                scene_len,
                ui_len
            );
            return false;
        }

        frame.scene.resize(scene_len, 0);
        frame.ui.resize(ui_len, 0);
        slot.read_scene(&mut frame.scene);
        slot.read_ui(&mut frame.ui);

        if !slot.still_holds(frame_id) {
            self.stats.torn_reads += 1;
            log::warn!("frame {} in slot {} was overwritten during read", frame_id, index);
            return false;
        }

        frame.frame_id = frame_id;
        frame.slot = index;
        self.last_seen = frame_id;
        self.stats.frames += 1;

        if !slot.release(frame_id) {
            log::debug!("slot {} reclaimed before release of frame {}", index, frame_id);
        }
        true
    }

    /// Frame id of the last frame returned, 0 before the first
    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn channel(&self) -> &FrameChannel<'a> {
        &self.channel
    }
}
