//! Single-producer single-consumer ring of input events
//!
//! `head` and `tail` are free-running `u32` counters; a record lives at
//! `index % INPUT_RING_CAPACITY`. The producer owns `tail`, the consumer owns
//! `head`. A full ring rejects the new event so everything already queued
//! keeps its order.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::{
    error::{BridgeError, Result},
    handle::RoleGuard,
    layout::{event_fields, ring_fields, RegionLayout, Section, SharedBytes, INPUT_RING_CAPACITY},
};

use super::event::InputEvent;

/// View over the input ring section
#[derive(Debug, Clone, Copy)]
pub struct InputRing<'a> {
    bytes: &'a SharedBytes,
    base: usize,
}

impl<'a> InputRing<'a> {
    pub fn new(bytes: &'a SharedBytes, layout: &RegionLayout) -> Self {
        Self {
            bytes,
            base: layout.window(Section::InputRing).offset,
        }
    }

    fn head_field(&self) -> &'a AtomicU32 {
        self.bytes.atomic_u32(self.base + ring_fields::HEAD)
    }

    fn tail_field(&self) -> &'a AtomicU32 {
        self.bytes.atomic_u32(self.base + ring_fields::TAIL)
    }

    fn dropped_field(&self) -> &'a AtomicU64 {
        self.bytes.atomic_u64(self.base + ring_fields::DROPPED)
    }

    fn record_offset(&self, index: u32) -> usize {
        self.base
            + ring_fields::EVENTS
            + (index % INPUT_RING_CAPACITY) as usize * event_fields::BYTES
    }

    pub fn capacity(&self) -> u32 {
        INPUT_RING_CAPACITY
    }

    pub fn head(&self) -> u32 {
        self.head_field().load(Ordering::Acquire)
    }

    pub fn tail(&self) -> u32 {
        self.tail_field().load(Ordering::Acquire)
    }

    /// Number of queued events
    pub fn len(&self) -> u32 {
        let head = self.head();
        self.tail().wrapping_sub(head)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= INPUT_RING_CAPACITY
    }

    /// Events rejected because the ring was full
    pub fn events_dropped(&self) -> u64 {
        self.dropped_field().load(Ordering::Relaxed)
    }

    pub(crate) fn reset(&self) {
        self.bytes.zero(
            self.base + ring_fields::EVENTS,
            INPUT_RING_CAPACITY as usize * event_fields::BYTES,
        );
        self.dropped_field().store(0, Ordering::Relaxed);
        self.head_field().store(0, Ordering::Relaxed);
        self.tail_field().store(0, Ordering::Release);
    }
}

/// Counters of one endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InputStats {
    pub events: u64,
    pub dropped: u64,
    pub corrupt: u64,
}

/// The single writer of the input ring
#[derive(Debug)]
pub struct InputProducer<'a> {
    ring: InputRing<'a>,
    stats: InputStats,
    _role: RoleGuard<'a>,
}

impl<'a> InputProducer<'a> {
    pub(crate) fn new(ring: InputRing<'a>, role: RoleGuard<'a>) -> Self {
        Self {
            ring,
            stats: InputStats::default(),
            _role: role,
        }
    }

    /// Enqueue `event`. Returns `false` if the ring was full and the event
    /// was dropped.
    pub fn push(&mut self, event: InputEvent) -> bool {
        let tail = self.ring.tail_field().load(Ordering::Relaxed);
        let head = self.ring.head_field().load(Ordering::Acquire);

        if tail.wrapping_sub(head) >= INPUT_RING_CAPACITY {
            self.stats.dropped += 1;
            self.ring.dropped_field().fetch_add(1, Ordering::Relaxed);
            log::warn!("input ring full, dropped {:?} event", event.kind);
            return false;
        }

        self.ring
            .bytes
            .write_bytes(self.ring.record_offset(tail), &event.encode());
        self.ring
            .tail_field()
            .store(tail.wrapping_add(1), Ordering::Release);
        self.stats.events += 1;
        true
    }

    pub fn stats(&self) -> InputStats {
        self.stats
    }

    pub fn ring(&self) -> &InputRing<'a> {
        &self.ring
    }
}

/// The single reader of the input ring
#[derive(Debug)]
pub struct InputConsumer<'a> {
    ring: InputRing<'a>,
    stats: InputStats,
    _role: RoleGuard<'a>,
}

impl<'a> InputConsumer<'a> {
    pub(crate) fn new(ring: InputRing<'a>, role: RoleGuard<'a>) -> Self {
        Self {
            ring,
            stats: InputStats::default(),
            _role: role,
        }
    }

    /// Dequeue the oldest event, or `None` if the ring is empty.
    ///
    /// A record with an unknown kind is consumed and reported as
    /// [`BridgeError::CorruptEvent`]; the next call continues after it.
    pub fn pop(&mut self) -> Result<Option<InputEvent>> {
        let head = self.ring.head_field().load(Ordering::Relaxed);
        let tail = self.ring.tail_field().load(Ordering::Acquire);

        if head == tail {
            return Ok(None);
        }

        let mut record = [0u8; event_fields::BYTES];
        self.ring
            .bytes
            .read_bytes(self.ring.record_offset(head), &mut record);
        self.ring
            .head_field()
            .store(head.wrapping_add(1), Ordering::Release);

        match InputEvent::decode(&record) {
            Ok(event) => {
                self.stats.events += 1;
                Ok(Some(event))
            }
            Err(kind) => {
                self.stats.corrupt += 1;
                Err(BridgeError::corrupt_event(head, kind))
            }
        }
    }

    /// Dequeue everything currently queued. Corrupt records are skipped,
    /// counted and logged.
    pub fn drain(&mut self) -> Vec<InputEvent> {
        let mut events = Vec::with_capacity(self.ring.len() as usize);
        loop {
            match self.pop() {
                Ok(Some(event)) => events.push(event),
                Ok(None) => break,
                Err(e) => log::warn!("skipping input record: {}", e),
            }
        }
        events
    }

    pub fn stats(&self) -> InputStats {
        self.stats
    }

    pub fn ring(&self) -> &InputRing<'a> {
        &self.ring
    }
}
