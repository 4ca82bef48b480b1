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

//! The window-mapping protocol.
//!
//! A window is a contiguous range of logical positions plus the header generation
//! observed when it was mapped. It is only ever resolved to bytes while a bracket
//! guard is held, so a window can go stale but can never dangle:
//!
//! - a window *covers* a position when the position lies in its range and its
//!   generation matches the header;
//! - anything else is remapped at the requested position, sized by the view's
//!   window length and clamped to `len` (reads) or `capacity` (writes);
//! - growth and reordering bump the header generation, which invalidates every
//!   window at once.
//!
//! Sessions wrap a bracket guard together with a validated copy of the header.
//! Write sessions keep the header in memory and publish it on commit.

use crate::{
    channel::{ChannelError, SegmentRead, SegmentWrite},
    header::{SequenceHeader, HEADER_SIZE},
};
use bytemuck::Pod;
use meshvec_core::ContainerError;
use std::{marker::PhantomData, ops::Range};

/// A mapped range of logical positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    start: u32,
    end: u32,
    generation: u32,
    mapped: bool,
}

impl Window {
    /// A window that covers nothing.
    pub fn unmapped() -> Self {
        Self::default()
    }

    /// Maps `[position, position + window_len)` clamped to `limit`.
    pub(crate) fn map_at(position: u32, window_len: u32, limit: u32, generation: u32) -> Self {
        let end = position.saturating_add(window_len).min(limit).max(position);
        Self {
            start: position,
            end,
            generation,
            mapped: true,
        }
    }

    /// First mapped position.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// One past the last mapped position.
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of mapped positions.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Returns `true` if the window maps no position.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Header generation observed when the window was mapped.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Returns `true` once the window has been mapped at least once.
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// Returns `true` if `position` lies in the mapped range.
    pub fn contains(&self, position: u32) -> bool {
        self.mapped && (self.start..self.end).contains(&position)
    }

    /// Returns `true` if `position` can be resolved through this window under
    /// the header generation `generation`.
    pub(crate) fn covers(&self, position: u32, generation: u32) -> bool {
        self.contains(position) && self.generation == generation
    }

    fn byte_range(&self, header: &SequenceHeader) -> Range<usize> {
        let stride = header.stride as usize;
        HEADER_SIZE + self.start as usize * stride..HEADER_SIZE + self.end as usize * stride
    }
}

/// Iteration state of a windowed reader.
///
/// The cursor position is derived from the state: `0` before anything happened,
/// `i` when element `i` was peeked by `first`, `i + 1` once `i` was consumed by
/// `next`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IterState {
    /// Nothing read since the last restart.
    #[default]
    NotStarted,
    /// Positioned on an element that `first` returned but `next` has not yet.
    Peeked(u32),
    /// Positioned after an element `next` returned.
    Consumed(u32),
}

impl IterState {
    /// The position the next call to `next` yields.
    pub fn position(self) -> u32 {
        match self {
            IterState::NotStarted => 0,
            IterState::Peeked(i) => i,
            IterState::Consumed(i) => i.saturating_add(1),
        }
    }

    /// Returns `true` once every element of a `len`-element sequence was consumed.
    pub fn at_end(self, len: u32) -> bool {
        self.position() >= len
    }
}

/// Size of `T` as stored in the segment.
pub(crate) fn element_stride<T: Pod>() -> Result<u32, ContainerError> {
    match u32::try_from(std::mem::size_of::<T>()) {
        Ok(0) | Err(_) => Err(ContainerError::Layout(format!(
            "{} cannot be stored in a shared sequence",
            std::any::type_name::<T>()
        ))),
        Ok(stride) => Ok(stride),
    }
}

fn past_end(index: u32, limit: u32) -> ContainerError {
    ContainerError::Layout(format!("position {index} is past the end ({limit})"))
}

/// A read bracket together with the header it observed.
pub(crate) struct ReadSession<T, S> {
    segment: S,
    header: SequenceHeader,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Pod, S: SegmentRead> ReadSession<T, S> {
    pub(crate) fn open(segment: S) -> Result<Self, ContainerError> {
        let header = SequenceHeader::read(&segment)?;
        header.validate_for::<T>()?;
        header.check_backing(segment.bytes().len())?;
        Ok(Self {
            segment,
            header,
            _marker: PhantomData,
        })
    }

    pub(crate) fn header(&self) -> &SequenceHeader {
        &self.header
    }

    pub(crate) fn len(&self) -> u32 {
        self.header.len
    }

    /// Copies the element at `index` out of the segment.
    pub(crate) fn read_at(&self, index: u32) -> Result<T, ContainerError> {
        if index >= self.header.len {
            return Err(past_end(index, self.header.len));
        }
        let bytes = self.segment.map(self.header.element_range(index))?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Checks that every byte of `window` is backed by the segment.
    pub(crate) fn check_window(&self, window: &Window) -> Result<(), ContainerError> {
        self.segment.map(window.byte_range(&self.header))?;
        Ok(())
    }

    /// Copies the element at `index` out of the mapped window.
    pub(crate) fn read_windowed(&self, window: &Window, index: u32) -> Result<T, ContainerError> {
        if index >= self.header.len {
            return Err(past_end(index, self.header.len));
        }
        if !window.covers(index, self.header.generation) {
            return Err(ContainerError::Layout(format!(
                "position {index} is outside the mapped window {}..{}",
                window.start, window.end
            )));
        }
        let mapped = self.segment.map(window.byte_range(&self.header))?;
        let stride = self.header.stride as usize;
        let offset = (index - window.start) as usize * stride;
        Ok(bytemuck::pod_read_unaligned(&mapped[offset..offset + stride]))
    }
}

/// A write bracket together with the working copy of the header.
///
/// The header is written back on [`commit`](WriteSession::commit), or when the
/// session is dropped with pending changes.
pub(crate) struct WriteSession<T, S: SegmentWrite> {
    segment: S,
    header: SequenceHeader,
    dirty: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Pod, S: SegmentWrite> WriteSession<T, S> {
    pub(crate) fn open(segment: S) -> Result<Self, ContainerError> {
        let header = SequenceHeader::read(&segment)?;
        header.validate_for::<T>()?;
        header.check_backing(segment.bytes().len())?;
        Ok(Self {
            segment,
            header,
            dirty: false,
            _marker: PhantomData,
        })
    }

    pub(crate) fn len(&self) -> u32 {
        self.header.len
    }

    pub(crate) fn capacity(&self) -> u32 {
        self.header.capacity
    }

    pub(crate) fn generation(&self) -> u32 {
        self.header.generation
    }

    /// Makes room for `required` elements, growing the segment through the
    /// channel if needed.
    ///
    /// Growth aims for `max(2 * capacity, capacity + min_growth, required)` and
    /// falls back to exactly `required` when the owner refuses the larger size.
    /// Returns `true` if the segment grew, in which case the generation was
    /// bumped and every window is stale.
    pub(crate) fn ensure_capacity(&mut self, required: u32) -> Result<bool, ContainerError> {
        let current = self.header.capacity;
        if required <= current {
            return Ok(false);
        }

        let target = current
            .saturating_mul(2)
            .max(current.saturating_add(self.header.min_growth))
            .max(required);

        let granted = match self.request_elements(target) {
            Err(ChannelError::GrowthRefused { .. }) if target > required => {
                log::debug!("Growth to {target} elements refused, retrying with {required}");
                self.request_elements(required)
            }
            other => other,
        };
        let stride = self.header.stride;
        let granted = granted.map_err(|err| match err {
            ChannelError::GrowthRefused { limit, .. } => ContainerError::Capacity {
                requested: required as u64,
                limit: SequenceHeader::capacity_for(stride, limit),
            },
            other => other.into(),
        })?;

        let capacity =
            u32::try_from(SequenceHeader::capacity_for(stride, granted)).unwrap_or(u32::MAX);
        self.header.capacity = capacity;
        self.bump_generation();
        log::debug!(
            "Sequence storage grown from {current} to {capacity} elements (generation {})",
            self.header.generation
        );
        Ok(true)
    }

    fn request_elements(&mut self, count: u32) -> Result<usize, ChannelError> {
        let bytes = SequenceHeader::segment_bytes(self.header.stride, count).ok_or(
            ChannelError::GrowthRefused {
                requested: usize::MAX,
                limit: self.segment.bytes().len(),
            },
        )?;
        self.segment.request_growth(bytes)
    }

    pub(crate) fn read_at(&self, index: u32) -> Result<T, ContainerError> {
        if index >= self.header.len {
            return Err(past_end(index, self.header.len));
        }
        let bytes = self.segment.map(self.header.element_range(index))?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Writes `item` at `index`, which must lie within the capacity.
    pub(crate) fn write_at(&mut self, index: u32, item: &T) -> Result<(), ContainerError> {
        if index >= self.header.capacity {
            return Err(past_end(index, self.header.capacity));
        }
        let range = self.header.element_range(index);
        self.segment
            .map_mut(range)?
            .copy_from_slice(bytemuck::bytes_of(item));
        Ok(())
    }

    /// Checks that every byte of `window` is backed by the segment.
    pub(crate) fn check_window(&self, window: &Window) -> Result<(), ContainerError> {
        self.segment.map(window.byte_range(&self.header))?;
        Ok(())
    }

    /// Writes `item` at `index` through the mapped window.
    pub(crate) fn write_windowed(
        &mut self,
        window: &Window,
        index: u32,
        item: &T,
    ) -> Result<(), ContainerError> {
        if !window.covers(index, self.header.generation) || index >= self.header.capacity {
            return Err(ContainerError::Layout(format!(
                "position {index} is outside the mapped window {}..{}",
                window.start, window.end
            )));
        }
        let range = window.byte_range(&self.header);
        let stride = self.header.stride as usize;
        let offset = (index - window.start) as usize * stride;
        self.segment.map_mut(range)?[offset..offset + stride]
            .copy_from_slice(bytemuck::bytes_of(item));
        Ok(())
    }

    pub(crate) fn set_len(&mut self, len: u32) {
        if self.header.len != len {
            self.header.len = len;
            self.dirty = true;
        }
    }

    /// Marks every outstanding window stale.
    pub(crate) fn bump_generation(&mut self) {
        self.header.generation = self.header.generation.wrapping_add(1);
        self.dirty = true;
    }
}

impl<T, S: SegmentWrite> WriteSession<T, S> {
    /// Publishes the working header.
    pub(crate) fn commit(&mut self) -> Result<(), ContainerError> {
        if self.dirty {
            self.header.write(&mut self.segment)?;
            self.dirty = false;
        }
        Ok(())
    }
}

impl<T, S: SegmentWrite> Drop for WriteSession<T, S> {
    fn drop(&mut self) {
        if let Err(err) = self.commit() {
            log::warn!("Failed to publish sequence header on bracket release: {err}");
        }
    }
}
