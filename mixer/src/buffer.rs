use log::trace;
use std::collections::VecDeque;
use std::sync::Mutex;
use voice_core::PcmFrame;

/// Most frames one speaker may have queued; pushes beyond this are dropped.
pub const INPUT_QUEUE_LIMIT: usize = 10;

/// Most mixed frames one listener may have pending before mixing is skipped.
pub const OUTPUT_QUEUE_LIMIT: usize = 10;

/// A queued frame together with its per-speaker admission sequence number.
///
/// Sequence numbers increase monotonically per buffer and give every frame
/// a value-comparable identity, so "already mixed this exact frame" checks
/// never depend on storage addresses.
#[derive(Debug, Clone)]
pub struct SequencedFrame {
    pub seq: u64,
    pub frame: PcmFrame,
}

#[derive(Debug, Default)]
struct FrameQueue {
    frames: VecDeque<SequencedFrame>,
    next_seq: u64,
}

/// Bounded FIFO of frames recently received from one speaker.
///
/// Admission and eviction are decoupled: the producer only ever appends
/// (and is refused when full), while eviction happens exactly once per tick
/// in the scheduler's trim step, after every listener needing this
/// speaker's audio has read it. Reads never remove.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    queue: Mutex<FrameQueue>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a frame. Returns false when the queue was full and the frame
    /// was dropped; never blocks.
    pub fn push(&self, frame: PcmFrame) -> bool {
        let mut queue = self.queue.lock().unwrap();
        if queue.frames.len() >= INPUT_QUEUE_LIMIT {
            trace!("input queue full, dropping frame");
            return false;
        }
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.frames.push_back(SequencedFrame { seq, frame });
        true
    }

    /// The oldest queued frame, without removing it.
    pub fn peek_oldest(&self) -> Option<SequencedFrame> {
        self.queue.lock().unwrap().frames.front().cloned()
    }

    /// The oldest frame admitted after the given sequence watermark, or the
    /// oldest overall when no watermark is known yet.
    pub fn first_after(&self, watermark: Option<u64>) -> Option<SequencedFrame> {
        let queue = self.queue.lock().unwrap();
        match watermark {
            None => queue.frames.front().cloned(),
            Some(seq) => queue.frames.iter().find(|f| f.seq > seq).cloned(),
        }
    }

    /// Remove the oldest queued frame; a no-op when empty.
    pub fn drop_oldest(&self) {
        self.queue.lock().unwrap().frames.pop_front();
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().frames.is_empty()
    }
}

/// Bounded FIFO of mixed frames awaiting pickup by the voice transport.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    frames: Mutex<VecDeque<PcmFrame>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the mixer may produce another frame for this listener.
    /// A stalled consumer trips this and the listener's tick is skipped.
    pub fn has_capacity(&self) -> bool {
        self.frames.lock().unwrap().len() <= OUTPUT_QUEUE_LIMIT
    }

    /// Append a mixed frame. Refused (false) when the consumer has fallen
    /// more than the queue limit behind.
    pub fn push(&self, frame: PcmFrame) -> bool {
        let mut frames = self.frames.lock().unwrap();
        if frames.len() > OUTPUT_QUEUE_LIMIT {
            trace!("output queue congested, dropping mixed frame");
            return false;
        }
        frames.push_back(frame);
        true
    }

    /// Non-blocking pop of the oldest mixed frame.
    pub fn pop(&self) -> Option<PcmFrame> {
        self.frames.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().unwrap().is_empty()
    }
}
