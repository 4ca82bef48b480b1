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

//! The shared-memory channel contract.
//!
//! A channel is the already-established link between the owner process and its
//! clients. This crate only needs three things from it:
//!
//! 1. an access bracket ([`SharedChannel::acquire_read`] / [`SharedChannel::acquire_write`]),
//!    returned as a guard that releases the bracket when dropped;
//! 2. a mapping from a byte range of the segment to addressable memory
//!    ([`SegmentRead::map`] / [`SegmentWrite::map_mut`]);
//! 3. a growth request serviced by the owner ([`SegmentWrite::request_growth`]).
//!
//! Process launch, handshake and transport live outside this crate. [`HeapChannel`]
//! is the in-process implementation used when both sides share an address space,
//! and by the tests.

mod heap;

pub use heap::{HeapChannel, HeapReadGuard, HeapWriteGuard};

use std::ops::Range;
use thiserror::Error;

/// An error reported by a shared-memory channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The other side of the channel is gone.
    #[error("Channel disconnected")]
    Disconnected,
    /// A process panicked while holding an access bracket.
    #[error("Access bracket poisoned by a panicking holder")]
    Poisoned,
    /// A mapping request fell outside the segment.
    #[error("Byte range {start}..{end} is outside the {len}-byte segment")]
    OutOfRange {
        /// First requested byte.
        start: usize,
        /// One past the last requested byte.
        end: usize,
        /// Current segment length.
        len: usize,
    },
    /// The owner refused to enlarge the segment.
    #[error("Growth to {requested} bytes refused (limit: {limit} bytes)")]
    GrowthRefused {
        /// Requested segment length, in bytes.
        requested: usize,
        /// Largest segment length the owner allows, in bytes.
        limit: usize,
    },
}

/// Read access to the segment, held for the duration of a read bracket.
pub trait SegmentRead {
    /// The whole segment as currently mapped.
    fn bytes(&self) -> &[u8];

    /// Maps a byte range of the segment.
    fn map(&self, range: Range<usize>) -> Result<&[u8], ChannelError> {
        let bytes = self.bytes();
        let len = bytes.len();
        bytes
            .get(range.clone())
            .ok_or(ChannelError::OutOfRange {
                start: range.start,
                end: range.end,
                len,
            })
    }
}

/// Write access to the segment, held for the duration of a write bracket.
pub trait SegmentWrite: SegmentRead {
    /// The whole segment as currently mapped, writable.
    fn bytes_mut(&mut self) -> &mut [u8];

    /// Maps a byte range of the segment for writing.
    fn map_mut(&mut self, range: Range<usize>) -> Result<&mut [u8], ChannelError> {
        let len = self.bytes().len();
        self.bytes_mut()
            .get_mut(range.clone())
            .ok_or(ChannelError::OutOfRange {
                start: range.start,
                end: range.end,
                len,
            })
    }

    /// Asks the owner to enlarge the segment to at least `min_bytes`.
    ///
    /// Existing bytes are preserved; their addresses are not. Every slice obtained
    /// from the segment before the call must be considered unmapped afterwards,
    /// which the borrow checker enforces for slices taken from this guard.
    ///
    /// Returns the segment length after the request.
    fn request_growth(&mut self, min_bytes: usize) -> Result<usize, ChannelError>;
}

/// An established shared-memory channel.
///
/// Cloning a channel hands out another endpoint onto the same segment, the way a
/// second process would open the same shared-memory handle.
pub trait SharedChannel {
    /// Guard representing an open read bracket.
    type ReadGuard<'a>: SegmentRead
    where
        Self: 'a;

    /// Guard representing an open write bracket.
    type WriteGuard<'a>: SegmentWrite
    where
        Self: 'a;

    /// Opens a read bracket, blocking while a write bracket is held elsewhere.
    fn acquire_read(&self) -> Result<Self::ReadGuard<'_>, ChannelError>;

    /// Opens a write bracket, blocking while any other bracket is held.
    fn acquire_write(&self) -> Result<Self::WriteGuard<'_>, ChannelError>;
}
