//! Growable accumulator for incrementally-read HTTP response bodies.
//!
//! The transport reads a body in chunks of at most [`TRANSPORT_CHUNK_SIZE`]
//! bytes and appends each one to a [`ResponseBuffer`].  Once the transfer is
//! complete the caller parses [`ResponseBuffer::as_bytes`].
//!
//! # Why not just `Vec::extend_from_slice`? (for beginners)
//!
//! `Vec` already grows geometrically, but it aborts the process when an
//! allocation fails.  A broker that streams an unbounded body must not be
//! able to take the client down, so growth here goes through
//! [`Vec::try_reserve_exact`] and a failed allocation surfaces as
//! [`BufferError::OutOfMemory`], which aborts only the in-flight request.
//! An optional hard ceiling ([`ResponseBuffer::with_limit`]) rejects bodies
//! that are merely too large before any allocation is attempted.

use thiserror::Error;

/// Natural chunk size of the HTTP transport.
pub const TRANSPORT_CHUNK_SIZE: usize = 16 * 1024;

/// Starting capacity: two transport chunks, enough for typical VM lists.
pub const INITIAL_CAPACITY: usize = TRANSPORT_CHUNK_SIZE * 2;

/// Errors raised while accumulating a response body.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// The allocator refused to grow the buffer.
    #[error("out of memory growing response buffer to {requested} bytes")]
    OutOfMemory { requested: usize },

    /// The body exceeded the configured ceiling.
    #[error("response body exceeds limit of {limit} bytes")]
    LimitExceeded { limit: usize },
}

/// Accumulates the bytes of one response body.
///
/// The buffer is reused between requests of the same session: [`reset`]
/// clears the contents but keeps the capacity.
///
/// [`reset`]: ResponseBuffer::reset
#[derive(Debug, Clone)]
pub struct ResponseBuffer {
    data: Vec<u8>,
    limit: Option<usize>,
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuffer {
    /// Creates a buffer with [`INITIAL_CAPACITY`] and no size ceiling.
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            limit: None,
        }
    }

    /// Sets a hard ceiling on the accumulated body size.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Appends `chunk` to the buffer, growing capacity at least twofold when
    /// the remaining space is insufficient.
    ///
    /// On error the buffer is left unchanged.
    ///
    /// # Errors
    ///
    /// - [`BufferError::LimitExceeded`] if the new length would pass the
    ///   ceiling set by [`with_limit`](Self::with_limit).
    /// - [`BufferError::OutOfMemory`] if the allocation fails.
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), BufferError> {
        let needed = self
            .data
            .len()
            .checked_add(chunk.len())
            .ok_or(BufferError::OutOfMemory { requested: usize::MAX })?;

        if let Some(limit) = self.limit {
            if needed > limit {
                return Err(BufferError::LimitExceeded { limit });
            }
        }

        if needed > self.data.capacity() {
            let doubled = self.data.capacity().saturating_mul(2).max(TRANSPORT_CHUNK_SIZE);
            let mut target = doubled.max(needed);
            if let Some(limit) = self.limit {
                // Never reserve past the ceiling; `needed <= limit` holds here.
                target = target.min(limit);
            }
            self.data
                .try_reserve_exact(target - self.data.len())
                .map_err(|_| BufferError::OutOfMemory { requested: target })?;
        }

        self.data.extend_from_slice(chunk);
        Ok(())
    }

    /// Clears the contents without releasing capacity.
    pub fn reset(&mut self) {
        self.data.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
