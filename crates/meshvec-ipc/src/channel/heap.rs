// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! An in-process channel backed by a heap-allocated segment.

use super::{ChannelError, SegmentRead, SegmentWrite, SharedChannel};
use crate::config::SequenceConfig;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

#[derive(Debug)]
struct HeapSegment {
    bytes: Vec<u8>,
    /// Growth budget set by the owner when the channel was opened.
    max_bytes: usize,
}

/// A [`SharedChannel`] whose segment lives on the heap of the current process.
///
/// Every clone is an endpoint onto the same segment. The access bracket is a
/// reader/writer lock; growth reallocates the byte vector, moving every element,
/// exactly like a remapped shared-memory region would.
#[derive(Debug, Clone)]
pub struct HeapChannel {
    segment: Arc<RwLock<HeapSegment>>,
    connected: Arc<AtomicBool>,
}

impl HeapChannel {
    /// Opens an empty segment that may grow up to `max_bytes`.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            segment: Arc::new(RwLock::new(HeapSegment {
                bytes: Vec::new(),
                max_bytes,
            })),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Opens an empty segment using the byte budget of `config`.
    pub fn from_config(config: &SequenceConfig) -> Self {
        Self::new(config.max_bytes)
    }

    /// Tears the channel down for every endpoint. Later brackets fail with
    /// [`ChannelError::Disconnected`].
    pub fn disconnect(&self) {
        log::debug!("HeapChannel: disconnecting all endpoints");
        self.connected.store(false, Ordering::Release);
    }

    /// Returns `true` until [`disconnect`](Self::disconnect) is called.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Current segment length in bytes. Briefly opens a read bracket.
    pub fn segment_len(&self) -> Result<usize, ChannelError> {
        Ok(self.acquire_read()?.bytes().len())
    }

    fn ensure_connected(&self) -> Result<(), ChannelError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ChannelError::Disconnected)
        }
    }
}

impl SharedChannel for HeapChannel {
    type ReadGuard<'a>
        = HeapReadGuard<'a>
    where
        Self: 'a;
    type WriteGuard<'a>
        = HeapWriteGuard<'a>
    where
        Self: 'a;

    fn acquire_read(&self) -> Result<HeapReadGuard<'_>, ChannelError> {
        self.ensure_connected()?;
        let guard = self.segment.read().map_err(|_| ChannelError::Poisoned)?;
        Ok(HeapReadGuard { guard })
    }

    fn acquire_write(&self) -> Result<HeapWriteGuard<'_>, ChannelError> {
        self.ensure_connected()?;
        let guard = self.segment.write().map_err(|_| ChannelError::Poisoned)?;
        Ok(HeapWriteGuard {
            guard,
            connected: &self.connected,
        })
    }
}

/// Read bracket on a [`HeapChannel`].
#[derive(Debug)]
pub struct HeapReadGuard<'a> {
    guard: RwLockReadGuard<'a, HeapSegment>,
}

impl SegmentRead for HeapReadGuard<'_> {
    fn bytes(&self) -> &[u8] {
        &self.guard.bytes
    }
}

/// Write bracket on a [`HeapChannel`].
#[derive(Debug)]
pub struct HeapWriteGuard<'a> {
    guard: RwLockWriteGuard<'a, HeapSegment>,
    connected: &'a AtomicBool,
}

impl SegmentRead for HeapWriteGuard<'_> {
    fn bytes(&self) -> &[u8] {
        &self.guard.bytes
    }
}

impl SegmentWrite for HeapWriteGuard<'_> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.guard.bytes
    }

    fn request_growth(&mut self, min_bytes: usize) -> Result<usize, ChannelError> {
        // The owner cannot answer once the channel is down.
        if !self.connected.load(Ordering::Acquire) {
            return Err(ChannelError::Disconnected);
        }

        let segment = &mut *self.guard;
        if min_bytes <= segment.bytes.len() {
            return Ok(segment.bytes.len());
        }
        if min_bytes > segment.max_bytes {
            log::warn!(
                "HeapChannel: refusing growth to {} bytes (limit {})",
                min_bytes,
                segment.max_bytes
            );
            return Err(ChannelError::GrowthRefused {
                requested: min_bytes,
                limit: segment.max_bytes,
            });
        }

        segment.bytes.resize(min_bytes, 0);
        log::trace!("HeapChannel: segment grown to {min_bytes} bytes");
        Ok(min_bytes)
    }
}
