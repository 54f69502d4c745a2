//! Producer side of the frame channel

use crate::{
    error::{BridgeError, Result},
    handle::RoleGuard,
};

use super::{FrameChannel, FrameStats, PublishOutcome};

/// The single frame writer of a region
#[derive(Debug)]
pub struct FrameProducer<'a> {
    channel: FrameChannel<'a>,
    stats: FrameStats,
    _role: RoleGuard<'a>,
}

impl<'a> FrameProducer<'a> {
    pub(crate) fn new(channel: FrameChannel<'a>, role: RoleGuard<'a>) -> Self {
        Self {
            channel,
            stats: FrameStats::default(),
            _role: role,
        }
    }

    /// Copy `scene` and `ui` into a slot and publish them as one frame
    pub fn publish(&mut self, scene: &[u8], ui: &[u8]) -> Result<PublishOutcome> {
        self.publish_with(scene.len(), ui.len(), |scene_dst, ui_dst| {
            scene_dst.copy_from_slice(scene);
            ui_dst.copy_from_slice(ui);
        })
    }

    /// Publish a frame whose payloads are written in place by `fill`.
    ///
    /// `fill` receives the scene and UI ranges of the claimed slot, exactly
    /// `scene_len` and `ui_len` bytes long. Lengths above the slot
    /// capacities are rejected before anything is written. If `fill`
    /// panics, the slot is reclaimed by the next publish.
    pub fn publish_with<F>(&mut self, scene_len: usize, ui_len: usize, fill: F) -> Result<PublishOutcome>
    where
        F: FnOnce(&mut [u8], &mut [u8]),
    {
        let capacities = self.channel.capacities();
        if scene_len > capacities.scene {
            return Err(BridgeError::payload_too_large("scene", scene_len, capacities.scene));
        }
        if ui_len > capacities.ui {
            return Err(BridgeError::payload_too_large("ui", ui_len, capacities.ui));
        }

        let (index, dropped) = self.select_slot();
        let slot = self.channel.slot(index);

        slot.claim();
        slot.set_lengths(scene_len, ui_len);
        // SAFETY: the slot is claimed and this is the only producer.
        let (scene_dst, ui_dst) = unsafe { slot.payload_mut(scene_len, ui_len) };
        fill(scene_dst, ui_dst);

        let frame_id = self.channel.next_frame_id();
        slot.publish(frame_id);
        self.channel.set_active(index);

        self.stats.frames += 1;
        if let Some(old) = dropped {
            self.stats.dropped += 1;
            self.channel.record_dropped();
            log::warn!(
                "consumer behind on both slots, dropped frame {} for frame {}",
                old,
                frame_id
            );
        }
        log::trace!("published frame {} in slot {}", frame_id, index);

        Ok(PublishOutcome {
            frame_id,
            slot: index,
            dropped,
        })
    }

    /// Pick the slot to write next.
    ///
    /// Prefers a free slot other than the one currently published. A slot
    /// left claimed by an unfinished publish counts as free. With no free
    /// slot, the older filled frame is sacrificed; a slot the consumer is in
    /// the middle of releasing is left alone.
    fn select_slot(&self) -> (usize, Option<u64>) {
        let active = self.channel.active_index();
        let other = 1 - active;

        for candidate in [other, active] {
            let slot = self.channel.slot(candidate);
            if slot.is_free() {
                log::debug!("writing free slot {}", candidate);
                return (candidate, None);
            }
            if slot.is_abandoned() {
                log::warn!("reclaiming slot {} left by an unfinished publish", candidate);
                return (candidate, None);
            }
        }

        let slots = [self.channel.slot(0), self.channel.slot(1)];
        let ids = [slots[0].frame_id(), slots[1].frame_id()];
        let victim = match (slots[0].is_ready(), slots[1].is_ready()) {
            (true, false) => 0,
            (false, true) => 1,
            _ if ids[0] <= ids[1] => 0,
            _ => 1,
        };

        let dropped = (ids[victim] != 0).then_some(ids[victim]);
        (slots[victim].index(), dropped)
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Frames dropped across every producer that ever wrote this region
    pub fn frames_dropped(&self) -> u64 {
        self.channel.frames_dropped()
    }

    pub fn channel(&self) -> &FrameChannel<'a> {
        &self.channel
    }
}
