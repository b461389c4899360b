//! Plumbing shared by the pipeline stages: cancellation, chunked sending and
//! full-buffer reads.

use std::{
    io::{self, Read},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crossbeam_channel::{Receiver, Sender};

use crate::error::{Error, Result};

/// Run-wide stop flag. Tripped by the first stage that fails; every other
/// stage checks it before each blocking send or receive.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once the run is being torn down
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Send one chunk downstream, blocking while the queue is full
pub fn send_chunk<T>(tx: &Sender<T>, chunk: T, cancel: &CancelToken) -> Result<()> {
    cancel.check()?;
    tx.send(chunk).map_err(|_| Error::Hangup)
}

/// Receive one chunk, or `None` once the producer has closed its end
pub fn recv_chunk<T>(rx: &Receiver<T>, cancel: &CancelToken) -> Result<Option<T>> {
    cancel.check()?;
    Ok(rx.recv().ok())
}

/// Somewhere for a codec to put the elements it decodes
pub trait Sink<T> {
    fn push(&mut self, item: T) -> Result<()>;
}

impl<T> Sink<T> for Vec<T> {
    fn push(&mut self, item: T) -> Result<()> {
        Vec::push(self, item);
        Ok(())
    }
}

/// Groups elements into chunks of exactly `chunk_size` and sends each one
/// as soon as it fills. Only the last chunk, sent by [`ChunkSender::finish`],
/// may be shorter, and an empty chunk is never sent.
pub struct ChunkSender<T> {
    tx: Sender<Vec<T>>,
    buffer: Vec<T>,
    chunk_size: usize,
    cancel: CancelToken,
    sent: u64,
}

impl<T> ChunkSender<T> {
    pub fn new(tx: Sender<Vec<T>>, chunk_size: usize, cancel: CancelToken) -> Self {
        let chunk_size = chunk_size.max(1);
        ChunkSender {
            tx,
            buffer: Vec::with_capacity(chunk_size),
            chunk_size,
            cancel,
            sent: 0,
        }
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.chunk_size));
        self.sent += chunk.len() as u64;
        send_chunk(&self.tx, chunk, &self.cancel)
    }

    /// Send whatever is left and close the stream. Returns the number of
    /// elements sent over the lifetime of this sender.
    pub fn finish(mut self) -> Result<u64> {
        self.flush()?;
        Ok(self.sent)
    }
}

impl<T> Sink<T> for ChunkSender<T> {
    #[inline]
    fn push(&mut self, item: T) -> Result<()> {
        self.buffer.push(item);
        if self.buffer.len() == self.chunk_size {
            self.flush()?;
        }
        Ok(())
    }
}

/// Read until `buf` is full or the reader is exhausted, returning the
/// number of bytes read. Short reads from decompressors are absorbed here
/// so that chunks come out at a fixed size.
pub fn read_full(rdr: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match rdr.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
