//! Read-ahead chunk source
//!
//! A background thread reads ahead of the consumer into a fixed ring of
//! reusable buffers. The ring is two bounded channels: `free` carries empty
//! slots to the producer, `filled` carries loaded slots to the consumer.
//! A slot is owned by exactly one side at a time, so no copy is needed and
//! no lock is held across device I/O.
//!
//! The producer signals completion by dropping its end of `filled` when it
//! exits; [`ReadAheadSource::shutdown`] joins the thread, so the background
//! work is always finished before the source goes away.

use crate::error::{ImagerError, Result};
use crate::transfer::cancel::CancellationToken;
use crate::transfer::source::{read_some, ChunkSource, CHUNK_SIZE};
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Number of slots in the ring
pub const RING_SIZE: usize = 16;

/// How long a blocked side waits before re-checking cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(20);

struct Slot {
    buffer: Vec<u8>,
    filled: usize,
}

/// Chunk source backed by a background reader and a 16-slot ring
pub struct ReadAheadSource {
    filled: Option<Receiver<Slot>>,
    free: Option<Sender<Slot>>,
    current: Option<Slot>,
    cancel: CancellationToken,
    stop: Arc<AtomicBool>,
    producer: Option<JoinHandle<std::io::Result<u64>>>,
    consumed: u64,
}

impl ReadAheadSource {
    /// Start reading ahead from `reader`, yielding at most `total` bytes
    pub fn spawn<R>(reader: R, total: u64, cancel: CancellationToken) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        Self::with_ring(reader, total, cancel, RING_SIZE, CHUNK_SIZE)
    }

    /// Start reading ahead with a custom ring geometry
    pub fn with_ring<R>(
        reader: R,
        total: u64,
        cancel: CancellationToken,
        ring_size: usize,
        slot_size: usize,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let ring_size = ring_size.max(1);
        let (free_tx, free_rx) = bounded::<Slot>(ring_size);
        let (filled_tx, filled_rx) = bounded::<Slot>(ring_size);

        for _ in 0..ring_size {
            free_tx
                .send(Slot {
                    buffer: vec![0u8; slot_size.max(1)],
                    filled: 0,
                })
                .map_err(|_| ImagerError::ReadAheadFailed("ring setup failed".into()))?;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let producer = {
            let cancel = cancel.clone();
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("read-ahead".to_string())
                .spawn(move || produce(reader, total, free_rx, filled_tx, cancel, stop))?
        };

        Ok(Self {
            filled: Some(filled_rx),
            free: Some(free_tx),
            current: None,
            cancel,
            stop,
            producer: Some(producer),
            consumed: 0,
        })
    }

    /// Number of chunks handed to the consumer so far
    pub fn consumed_chunks(&self) -> u64 {
        self.consumed
    }
}

/// Producer loop run on the background thread. Returns the bytes read.
fn produce<R: Read>(
    mut reader: R,
    total: u64,
    free: Receiver<Slot>,
    filled: Sender<Slot>,
    cancel: CancellationToken,
    stop: Arc<AtomicBool>,
) -> std::io::Result<u64> {
    let mut position = 0u64;

    while position < total && !cancel.is_cancelled() && !stop.load(Ordering::SeqCst) {
        // Ring full: wait for the consumer to hand a slot back
        let mut slot = match free.recv_timeout(POLL_INTERVAL) {
            Ok(slot) => slot,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let want = (slot.buffer.len() as u64).min(total - position) as usize;
        let read = read_some(&mut reader, &mut slot.buffer[..want])?;
        if read == 0 {
            break;
        }
        slot.filled = read;
        position += read as u64;

        if filled.send(slot).is_err() {
            break;
        }
    }

    tracing::debug!(
        "Read-ahead producer exiting after {} of {} bytes (cancelled: {})",
        position,
        total,
        cancel.is_cancelled()
    );
    Ok(position)
}

impl ChunkSource for ReadAheadSource {
    fn next_chunk(&mut self) -> Result<&[u8]> {
        // Moving past the previous chunk releases its slot to the producer
        if let (Some(slot), Some(free)) = (self.current.take(), self.free.as_ref()) {
            let _ = free.send(slot);
        }

        let Some(filled) = self.filled.as_ref() else {
            return Ok(&[]);
        };

        let slot = match filled.try_recv() {
            Ok(slot) => slot,
            Err(TryRecvError::Disconnected) => return Ok(&[]),
            Err(TryRecvError::Empty) => loop {
                if self.cancel.is_cancelled() {
                    return Ok(&[]);
                }
                match filled.recv_timeout(POLL_INTERVAL) {
                    Ok(slot) => break slot,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => return Ok(&[]),
                }
            },
        };

        self.consumed += 1;
        let slot = self.current.insert(slot);
        Ok(&slot.buffer[..slot.filled])
    }

    fn shutdown(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        self.current = None;
        self.filled = None;
        self.free = None;

        match self.producer.take() {
            None => Ok(()),
            Some(handle) => match handle.join() {
                Ok(Ok(bytes)) => {
                    tracing::debug!("Read-ahead producer joined ({} bytes read)", bytes);
                    Ok(())
                }
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(ImagerError::ReadAheadFailed("producer thread panicked".into())),
            },
        }
    }
}

impl Drop for ReadAheadSource {
    fn drop(&mut self) {
        if self.producer.is_some() {
            if let Err(e) = self.shutdown() {
                tracing::warn!("Read-ahead shutdown on drop failed: {}", e);
            }
        }
    }
}
