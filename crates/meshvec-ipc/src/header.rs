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

//! The sequence header stored at the start of the shared segment.
//!
//! ```text
//! offset 0            HEADER_SIZE        HEADER_SIZE + stride * capacity
//! | SequenceHeader    | elem 0 | elem 1 | ... | elem capacity-1 |
//! ```
//!
//! Elements are addressed by logical index only. Byte offsets are recomputed from
//! the header every time they are needed, so nothing ever holds an address across
//! a growth event.

use crate::channel::{ChannelError, SegmentRead, SegmentWrite};
use bytemuck::{Pod, Zeroable};
use meshvec_core::ContainerError;
use std::ops::Range;

/// Identifies a segment laid out by this crate ("MVEC").
pub const SEQUENCE_MAGIC: u32 = u32::from_le_bytes(*b"MVEC");

/// Version of the segment layout.
pub const LAYOUT_VERSION: u32 = 1;

/// Size of [`SequenceHeader`] in bytes.
pub const HEADER_SIZE: usize = std::mem::size_of::<SequenceHeader>();

/// Bookkeeping shared by the owner and every client view.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SequenceHeader {
    /// Always [`SEQUENCE_MAGIC`].
    pub magic: u32,
    /// Always [`LAYOUT_VERSION`].
    pub version: u32,
    /// Size of one element, in bytes.
    pub stride: u32,
    /// Number of elements logically present.
    pub len: u32,
    /// Number of element slots backed by the segment.
    pub capacity: u32,
    /// Bumped whenever element addresses or positions change under the views
    /// (growth, reordering).
    pub generation: u32,
    /// Smallest growth step chosen by the owner, in elements.
    pub min_growth: u32,
    /// Padding, always zero.
    pub reserved: u32,
}

impl SequenceHeader {
    /// A header for an empty sequence of `stride`-byte elements.
    pub fn new(stride: u32, capacity: u32, min_growth: u32) -> Self {
        Self {
            magic: SEQUENCE_MAGIC,
            version: LAYOUT_VERSION,
            stride,
            len: 0,
            capacity,
            generation: 0,
            min_growth,
            reserved: 0,
        }
    }

    /// Reads the header from the start of the segment.
    pub fn read<S: SegmentRead + ?Sized>(segment: &S) -> Result<Self, ChannelError> {
        let bytes = segment.map(0..HEADER_SIZE)?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Writes the header to the start of the segment.
    pub fn write<S: SegmentWrite + ?Sized>(&self, segment: &mut S) -> Result<(), ChannelError> {
        segment
            .map_mut(0..HEADER_SIZE)?
            .copy_from_slice(bytemuck::bytes_of(self));
        Ok(())
    }

    /// Checks that the segment holds a sequence of `T`.
    pub fn validate_for<T: Pod>(&self) -> Result<(), ContainerError> {
        if self.magic != SEQUENCE_MAGIC {
            return Err(ContainerError::Layout(format!(
                "bad magic {:#010x}, expected {SEQUENCE_MAGIC:#010x}",
                self.magic
            )));
        }
        if self.version != LAYOUT_VERSION {
            return Err(ContainerError::Layout(format!(
                "layout version {} is not supported (expected {LAYOUT_VERSION})",
                self.version
            )));
        }
        let expected = std::mem::size_of::<T>();
        if self.stride as usize != expected || expected == 0 {
            return Err(ContainerError::Layout(format!(
                "element stride is {} bytes, expected {expected}",
                self.stride
            )));
        }
        if self.len > self.capacity {
            return Err(ContainerError::Layout(format!(
                "length {} exceeds capacity {}",
                self.len, self.capacity
            )));
        }
        Ok(())
    }

    /// Checks that a segment of `segment_len` bytes backs every slot the header
    /// claims.
    pub fn check_backing(&self, segment_len: usize) -> Result<(), ContainerError> {
        match Self::segment_bytes(self.stride, self.capacity) {
            Some(needed) if needed <= segment_len => Ok(()),
            _ => Err(ContainerError::Layout(format!(
                "segment of {segment_len} bytes cannot back {} elements of {} bytes",
                self.capacity, self.stride
            ))),
        }
    }

    /// Byte range of the element at `index`.
    pub fn element_range(&self, index: u32) -> Range<usize> {
        let start = HEADER_SIZE + index as usize * self.stride as usize;
        start..start + self.stride as usize
    }

    /// Segment length needed to back `capacity` elements of `stride` bytes.
    pub fn segment_bytes(stride: u32, capacity: u32) -> Option<usize> {
        (stride as usize)
            .checked_mul(capacity as usize)?
            .checked_add(HEADER_SIZE)
    }

    /// Largest element capacity a segment of `bytes` bytes can back.
    pub fn capacity_for(stride: u32, bytes: usize) -> u64 {
        match stride {
            0 => 0,
            stride => (bytes.saturating_sub(HEADER_SIZE) / stride as usize) as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{HeapChannel, SharedChannel};

    #[test]
    fn test_header_is_packed() {
        assert_eq!(HEADER_SIZE, 32);
    }

    #[test]
    fn test_short_segment_is_rejected() {
        let header = SequenceHeader::new(8, 10, 1);

        assert!(header.check_backing(HEADER_SIZE + 80).is_ok());
        let err = header.check_backing(HEADER_SIZE + 16).unwrap_err();
        assert!(matches!(err, ContainerError::Layout(_)));
    }

    #[test]
    fn test_header_roundtrip_through_segment() {
        let channel = HeapChannel::new(1024);
        let mut segment = channel.acquire_write().unwrap();
        segment.request_growth(HEADER_SIZE).unwrap();

        let mut header = SequenceHeader::new(16, 4, 2);
        header.len = 3;
        header.write(&mut segment).unwrap();

        assert_eq!(SequenceHeader::read(&segment).unwrap(), header);
    }

    #[test]
    fn test_read_from_empty_segment_fails() {
        let channel = HeapChannel::new(1024);
        let segment = channel.acquire_read().unwrap();
        assert!(matches!(
            SequenceHeader::read(&segment),
            Err(ChannelError::OutOfRange { len: 0, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_foreign_layouts() {
        let header = SequenceHeader::new(8, 4, 1);
        assert!(header.validate_for::<u64>().is_ok());
        assert!(matches!(
            header.validate_for::<u32>(),
            Err(ContainerError::Layout(_))
        ));

        let mut corrupted = header;
        corrupted.magic = 0xdead_beef;
        assert!(corrupted.validate_for::<u64>().is_err());

        let mut overfull = header;
        overfull.len = 5;
        assert!(overfull.validate_for::<u64>().is_err());
    }

    #[test]
    fn test_element_addressing() {
        let header = SequenceHeader::new(12, 4, 1);
        assert_eq!(header.element_range(0), HEADER_SIZE..HEADER_SIZE + 12);
        assert_eq!(header.element_range(2), HEADER_SIZE + 24..HEADER_SIZE + 36);
        assert_eq!(SequenceHeader::segment_bytes(12, 4), Some(HEADER_SIZE + 48));
        assert_eq!(SequenceHeader::capacity_for(12, HEADER_SIZE + 50), 4);
    }
}
