//! Frame Decode Scheduler
//!
//! # Purpose
//! Decodes a sequence of frames on a fixed pool of worker threads and hands
//! the results to a sink in strictly increasing frame order.
//!
//! # Design Notes
//! - **Input side**: one mutex guards the input cursor, the field source and
//!   a small cache of recently read frames. A worker takes the next index
//!   plus its lookbehind/lookahead window under that lock, so the source is
//!   read exactly once per frame, in order. Window frames are shared
//!   read-only (`Arc`) and never mutated.
//! - **Output side**: workers send `(index, result)` messages over a bounded
//!   channel to the calling thread, which is the only owner of the pending
//!   map and the output cursor. It publishes every contiguous run of
//!   finished frames as soon as the next expected index arrives.
//! - **Back-pressure**: a worker may only claim an index less than
//!   `threads * CHANNEL_DEPTH_PER_WORKER` ahead of the next frame to be
//!   written. It waits on a condition variable that the consumer signals
//!   after each write, so decoded frames held anywhere (in a worker, the
//!   channel or the pending map) never exceed that bound.
//! - **Cancellation**: the abort flag is checked before every fetch and in
//!   the back-pressure wait. On a write failure or a decode error the
//!   consumer raises it, wakes waiting workers and drops the receiver, so
//!   workers stop after their current frame. Frames are only ever published
//!   whole.
//!
//! # Worker lifecycle
//! `Idle -> FetchInput -> Decode -> PublishOutput -> (Idle | Done)`

use crate::error::{Error, Result};
use crate::frame::Field;
use crate::meters::DecodeMeters;
use crate::output::DecodedFrame;
use log::{debug, error, info};
use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::sync_channel;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

// Messages in flight per worker before a worker blocks on send.
const CHANNEL_DEPTH_PER_WORKER: usize = 2;

// =============================================================================
// COLLABORATOR TRAITS
// =============================================================================

/// Supplies field pairs by frame index. Frames are requested in strictly
/// increasing order, each exactly once.
pub trait FieldSource: Send {
    /// Number of frames available.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_frame(&mut self, index: usize) -> Result<(Field, Field)>;
}

/// Receives decoded frames in order.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &DecodedFrame) -> io::Result<()>;

    /// Called once after the last frame was written.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The two fields of one input frame.
#[derive(Debug)]
pub struct InputFrame {
    pub index: usize,
    pub first: Field,
    pub second: Field,
}

/// A frame to decode plus its read-only neighbours.
#[derive(Debug, Clone)]
pub struct FrameWindow {
    pub index: usize,
    frames: Vec<Arc<InputFrame>>,
}

impl FrameWindow {
    pub fn new(index: usize, frames: Vec<Arc<InputFrame>>) -> Self {
        Self { index, frames }
    }

    pub fn get(&self, index: usize) -> Option<&InputFrame> {
        self.frames.iter().find(|f| f.index == index).map(|f| f.as_ref())
    }

    pub fn current(&self) -> Option<&InputFrame> {
        self.get(self.index)
    }

    pub fn previous(&self) -> Option<&InputFrame> {
        self.index.checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn next(&self) -> Option<&InputFrame> {
        self.get(self.index + 1)
    }
}

/// A configured decoder that can hand out per-thread workers.
pub trait Decoder: Sync {
    type Worker: DecoderWorker;

    /// Frames needed before the one being decoded.
    fn lookbehind(&self) -> usize;

    /// Frames needed after the one being decoded.
    fn lookahead(&self) -> usize;

    fn make_worker(&self) -> Self::Worker;
}

/// Per-thread decoding state.
pub trait DecoderWorker {
    fn decode_frame(&mut self, window: &FrameWindow) -> Result<DecodedFrame>;
}

// =============================================================================
// INPUT SIDE
// =============================================================================

struct InputState<S> {
    source: S,
    cursor: usize,
    /// Frames read so far that a later window may still need.
    cache: VecDeque<Arc<InputFrame>>,
    next_read: usize,
    /// Next frame the consumer will write.
    published: usize,
}

impl<S: FieldSource> InputState<S> {
    fn new(source: S) -> Self {
        Self {
            source,
            cursor: 0,
            cache: VecDeque::new(),
            next_read: 0,
            published: 0,
        }
    }

    /// Whether the next index may be claimed without exceeding `max_ahead`
    /// frames past the output cursor. Always true once the source is
    /// exhausted so that waiting workers can finish.
    fn has_room(&self, max_ahead: usize) -> bool {
        self.cursor >= self.source.len() || self.cursor < self.published + max_ahead
    }

    /// Claim the next frame index and build its window.
    fn fetch(&mut self, lookbehind: usize, lookahead: usize) -> Option<(usize, Result<FrameWindow>)> {
        let total = self.source.len();
        if self.cursor >= total {
            return None;
        }
        let index = self.cursor;
        self.cursor += 1;

        let start = index.saturating_sub(lookbehind);
        let end = (index + lookahead).min(total - 1);
        while self.next_read <= end {
            let i = self.next_read;
            match self.source.read_frame(i) {
                Ok((first, second)) => self.cache.push_back(Arc::new(InputFrame {
                    index: i,
                    first,
                    second,
                })),
                Err(e) => return Some((index, Err(e))),
            }
            self.next_read += 1;
        }
        while self.cache.front().is_some_and(|f| f.index < start) {
            self.cache.pop_front();
        }

        let frames = self
            .cache
            .iter()
            .filter(|f| f.index >= start && f.index <= end)
            .cloned()
            .collect();
        Some((index, Ok(FrameWindow::new(index, frames))))
    }
}

// =============================================================================
// POOL
// =============================================================================

pub struct DecoderPool<'a, D: Decoder> {
    decoder: &'a D,
    threads: usize,
    meters: Arc<DecodeMeters>,
}

impl<'a, D: Decoder> DecoderPool<'a, D> {
    pub fn new(decoder: &'a D, threads: usize) -> Self {
        Self {
            decoder,
            threads: threads.max(1),
            meters: Arc::new(DecodeMeters::new()),
        }
    }

    pub fn meters(&self) -> Arc<DecodeMeters> {
        Arc::clone(&self.meters)
    }

    /// Decode every frame of `source` into `sink`. Returns the number of
    /// frames written.
    pub fn run<S: FieldSource, K: FrameSink>(&self, source: S, sink: &mut K) -> Result<usize> {
        let total = source.len();
        let started = Instant::now();
        self.meters.reset();
        info!(
            "Decoding {} frames on {} thread{}",
            total,
            self.threads,
            if self.threads == 1 { "" } else { "s" }
        );

        let input = Mutex::new(InputState::new(source));
        let room = Condvar::new();
        let abort = AtomicBool::new(false);
        let (lookbehind, lookahead) = (self.decoder.lookbehind(), self.decoder.lookahead());
        let max_ahead = self.threads * CHANNEL_DEPTH_PER_WORKER;

        let written = thread::scope(|scope| -> Result<usize> {
            let (tx, rx) = sync_channel::<(usize, Result<DecodedFrame>)>(max_ahead);

            for n in 0..self.threads {
                let tx = tx.clone();
                let input = &input;
                let room = &room;
                let abort = &abort;
                let meters = &self.meters;
                let decoder = self.decoder;
                thread::Builder::new()
                    .name(format!("decoder-{n}"))
                    .spawn_scoped(scope, move || {
                        let mut worker = decoder.make_worker();
                        loop {
                            let mut state = input.lock().unwrap_or_else(PoisonError::into_inner);
                            while !abort.load(Ordering::Acquire) && !state.has_room(max_ahead) {
                                state = room.wait(state).unwrap_or_else(PoisonError::into_inner);
                            }
                            if abort.load(Ordering::Acquire) {
                                break;
                            }
                            let fetched = state.fetch(lookbehind, lookahead);
                            drop(state);
                            let (index, result) = match fetched {
                                None => break,
                                Some((index, Err(e))) => (index, Err(e)),
                                Some((_, Ok(window))) => {
                                    let t0 = Instant::now();
                                    let result = worker.decode_frame(&window);
                                    meters.record_decoded(t0.elapsed().as_secs_f32() * 1000.0);
                                    (window.index, result)
                                }
                            };
                            let failed = result.is_err();
                            if tx.send((index, result)).is_err() || failed {
                                break;
                            }
                        }
                    })?;
            }
            drop(tx);

            let mut pending: BTreeMap<usize, DecodedFrame> = BTreeMap::new();
            let mut next = 0usize;
            let mut outcome: Result<()> = Ok(());

            'receive: for (index, result) in rx.iter() {
                let frame = match result {
                    Ok(frame) => frame,
                    Err(e) => {
                        error!("Aborting: frame {} failed: {}", index, e);
                        outcome = Err(e);
                        break 'receive;
                    }
                };
                pending.insert(index, frame);
                self.meters.record_pending(pending.len());

                while let Some(frame) = pending.remove(&next) {
                    if let Err(source) = sink.write_frame(&frame) {
                        error!("Aborting: could not write frame {}: {}", next, source);
                        outcome = Err(Error::WriteFailure {
                            frame: next,
                            source,
                        });
                        break 'receive;
                    }
                    debug!("published frame {}", next);
                    self.meters.record_written();
                    next += 1;
                    input.lock().unwrap_or_else(PoisonError::into_inner).published = next;
                    room.notify_all();
                }
            }

            if outcome.is_err() {
                abort.store(true, Ordering::Release);
                // taken so no worker misses the wake-up between its check and its wait
                let _state = input.lock().unwrap_or_else(PoisonError::into_inner);
                room.notify_all();
            }
            drop(rx);
            outcome.map(|_| next)
        })?;

        sink.finish().map_err(|source| Error::WriteFailure {
            frame: written,
            source,
        })?;

        let elapsed = started.elapsed().as_secs_f32();
        info!(
            "Decoded {} frames in {:.2} s ({:.1} fps)",
            written,
            elapsed,
            written as f32 / elapsed.max(1e-6)
        );
        Ok(written)
    }
}
