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

//! The client side of a shared sequence.
//!
//! A [`WindowedView`] only ever addresses a bounded range of the owner's storage.
//! Reading past the end of that range, or finding the range stale after the owner
//! grew or reordered the storage, remaps the window inside the current bracket.
//! Elements are copied out before the cursor advances, so a value returned by
//! `next` is never affected by the remap that follows it.

use crate::{
    channel::SharedChannel,
    config::SequenceConfig,
    protocol::{IterState, ReadSession, Window, WriteSession},
    stats::WindowStats,
};
use bytemuck::Pod;
use meshvec_core::{ContainerError, OrderedContainer, SequenceRead, SequenceWrite};
use std::marker::PhantomData;

/// Window, iteration state and counters of a view. Survives brackets.
#[derive(Debug, Clone, Copy, Default)]
struct ViewCursor {
    window: Window,
    state: IterState,
    stats: WindowStats,
}

impl ViewCursor {
    /// Counts an invalidation if the owner moved on since the window was mapped.
    fn observe_generation(&mut self, generation: u32) {
        if self.window.is_mapped() && self.window.generation() != generation {
            self.stats.invalidations += 1;
            log::trace!(
                "Window {}..{} invalidated (generation {} -> {generation})",
                self.window.start(),
                self.window.end(),
                self.window.generation()
            );
        }
    }

    fn install(&mut self, window: Window) {
        if self.window.is_mapped() {
            self.stats.remaps += 1;
        } else {
            self.stats.maps += 1;
        }
        log::trace!(
            "Window mapped at {}..{} (generation {})",
            window.start(),
            window.end(),
            window.generation()
        );
        self.window = window;
    }
}

/// A client's windowed view onto a [`SharedSequence`](crate::SharedSequence).
///
/// The view exposes the same container contract as the other backends except
/// ordering: it does not implement
/// [`RandomAccessContainer`](meshvec_core::RandomAccessContainer), since a party
/// that maps only part of the storage cannot reorder it. Appends are written
/// through the window; growth is requested from the owner over the channel.
///
/// Cloning a view duplicates the window descriptor and the channel handle, not
/// the storage.
///
/// Only the owner can reorder; asking a view to sort does not compile:
///
/// ```rust,compile_fail
/// use meshvec_core::{RandomAccessContainer, RenderMesh};
/// use meshvec_ipc::{HeapChannel, SequenceConfig, SharedSequence, WindowedView};
///
/// let config = SequenceConfig::default();
/// let channel = HeapChannel::from_config(&config);
/// let owner = SharedSequence::<RenderMesh, _>::create(channel, &config).unwrap();
/// let mut view: WindowedView<RenderMesh, HeapChannel> = owner.view(16).unwrap();
/// view.sort_by_state().unwrap();
/// ```
pub struct WindowedView<T, C> {
    channel: C,
    window_len: u32,
    cursor: ViewCursor,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C: Clone> Clone for WindowedView<T, C> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            window_len: self.window_len,
            cursor: self.cursor,
            _marker: PhantomData,
        }
    }
}

impl<T: Pod, C: SharedChannel> WindowedView<T, C> {
    /// Attaches to the sequence in the channel's segment and maps the first
    /// `window_len` elements.
    ///
    /// # Errors
    ///
    /// [`ContainerError::Config`] for a zero window length, and
    /// [`ContainerError::Layout`] when the segment does not hold a sequence of `T`.
    pub fn attach(channel: C, window_len: u32) -> Result<Self, ContainerError> {
        if window_len == 0 {
            return Err(ContainerError::Config(
                "window_len must be at least one element".to_string(),
            ));
        }

        let mut cursor = ViewCursor::default();
        {
            let session = ReadSession::<T, _>::open(channel.acquire_read()?)?;
            let header = *session.header();
            let window = Window::map_at(0, window_len, header.len, header.generation);
            session.check_window(&window)?;
            cursor.install(window);
            log::debug!(
                "Attached view to a sequence of {} elements (window of {window_len})",
                header.len
            );
        }

        Ok(Self {
            channel,
            window_len,
            cursor,
            _marker: PhantomData,
        })
    }

    /// Attaches using the window length of a validated configuration.
    pub fn attach_with_config(
        channel: C,
        config: &SequenceConfig,
    ) -> Result<Self, ContainerError> {
        config.validate()?;
        Self::attach(channel, config.window_len)
    }

    /// The currently mapped window.
    pub fn window(&self) -> Window {
        self.cursor.window
    }

    /// Number of elements mapped at once.
    pub fn window_len(&self) -> u32 {
        self.window_len
    }

    /// Current iteration state.
    pub fn iter_state(&self) -> IterState {
        self.cursor.state
    }

    /// Remap and traffic counters.
    pub fn stats(&self) -> WindowStats {
        self.cursor.stats
    }

    /// The channel the view reads through.
    pub fn channel(&self) -> &C {
        &self.channel
    }
}

impl<T: Pod, C: SharedChannel> OrderedContainer for WindowedView<T, C> {
    type Item = T;
    type Reader<'a>
        = ViewReader<'a, T, C>
    where
        Self: 'a;
    type Writer<'a>
        = ViewWriter<'a, T, C>
    where
        Self: 'a;

    fn start_read(&mut self) -> Result<ViewReader<'_, T, C>, ContainerError> {
        let session = ReadSession::open(self.channel.acquire_read()?)?;
        self.cursor.observe_generation(session.header().generation);
        Ok(ViewReader {
            session,
            cursor: &mut self.cursor,
            window_len: self.window_len,
            failure: None,
        })
    }

    fn start_write(&mut self) -> Result<ViewWriter<'_, T, C>, ContainerError> {
        let session = WriteSession::open(self.channel.acquire_write()?)?;
        self.cursor.observe_generation(session.generation());
        Ok(ViewWriter {
            session,
            cursor: &mut self.cursor,
            window_len: self.window_len,
        })
    }
}

/// Read token of a [`WindowedView`]. Holds the channel's read bracket.
pub struct ViewReader<'a, T, C: SharedChannel + 'a> {
    session: ReadSession<T, C::ReadGuard<'a>>,
    cursor: &'a mut ViewCursor,
    window_len: u32,
    failure: Option<ContainerError>,
}

impl<T: Pod, C: SharedChannel> ViewReader<'_, T, C> {
    /// Remaps the window so that it covers `position`.
    fn map_for_read(&mut self, position: u32) -> Result<(), ContainerError> {
        let header = self.session.header();
        if self.cursor.window.covers(position, header.generation) {
            return Ok(());
        }
        let window = Window::map_at(position, self.window_len, header.len, header.generation);
        self.session.check_window(&window)?;
        self.cursor.install(window);
        Ok(())
    }

    fn fetch(&mut self, position: u32) -> Result<T, ContainerError> {
        self.map_for_read(position)?;
        let item = self.session.read_windowed(&self.cursor.window, position)?;
        self.cursor.stats.elements_read += 1;
        Ok(item)
    }
}

impl<T: Pod, C: SharedChannel> Iterator for ViewReader<'_, T, C> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let len = self.session.len();
        let position = self.cursor.state.position();
        if position >= len {
            return None;
        }

        let item = match self.fetch(position) {
            Ok(item) => item,
            Err(err) => {
                log::error!("Failed to read element {position} through the window: {err}");
                self.failure = Some(err);
                return None;
            }
        };
        self.cursor.state = IterState::Consumed(position);

        // The element is already copied out; moving the window cannot affect it.
        let following = position + 1;
        if following < len {
            if let Err(err) = self.map_for_read(following) {
                log::warn!("Failed to map the window at {following}: {err}");
            }
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .session
            .len()
            .saturating_sub(self.cursor.state.position()) as usize;
        (remaining, Some(remaining))
    }
}

impl<T: Pod, C: SharedChannel> SequenceRead for ViewReader<'_, T, C> {
    fn restart(&mut self) {
        self.cursor.state = IterState::NotStarted;
        if self.session.len() > 0 {
            if let Err(err) = self.map_for_read(0) {
                log::warn!("Failed to map the window at 0: {err}");
            }
        }
    }

    fn first(&mut self) -> Option<T> {
        if self.session.len() == 0 {
            return None;
        }
        match self.fetch(0) {
            Ok(item) => {
                if self.cursor.state == IterState::NotStarted {
                    self.cursor.state = IterState::Peeked(0);
                }
                Some(item)
            }
            Err(err) => {
                log::error!("Failed to read the first element through the window: {err}");
                self.failure = Some(err);
                None
            }
        }
    }

    fn at_end(&self) -> bool {
        self.cursor.state.at_end(self.session.len())
    }

    fn size(&self) -> u32 {
        self.session.len()
    }

    fn take_error(&mut self) -> Option<ContainerError> {
        self.failure.take()
    }
}

/// Write token of a [`WindowedView`]. Holds the channel's write bracket.
pub struct ViewWriter<'a, T, C: SharedChannel + 'a> {
    session: WriteSession<T, C::WriteGuard<'a>>,
    cursor: &'a mut ViewCursor,
    window_len: u32,
}

impl<T: Pod, C: SharedChannel> ViewWriter<'_, T, C> {
    /// Asks the owner for room for `required` elements.
    fn request_room(&mut self, required: u32) -> Result<(), ContainerError> {
        if required <= self.session.capacity() {
            return Ok(());
        }
        self.cursor.stats.growth_requests += 1;
        // Growth bumps the generation, so the next mapping replaces the window.
        self.session.ensure_capacity(required)?;
        Ok(())
    }

    /// Remaps the window so that it covers `position` for writing.
    fn map_for_write(&mut self, position: u32) -> Result<(), ContainerError> {
        let generation = self.session.generation();
        if self.cursor.window.covers(position, generation) {
            return Ok(());
        }
        let window = Window::map_at(
            position,
            self.window_len,
            self.session.capacity(),
            generation,
        );
        self.session.check_window(&window)?;
        self.cursor.install(window);
        Ok(())
    }
}

impl<T: Pod, C: SharedChannel> SequenceWrite for ViewWriter<'_, T, C> {
    type Item = T;

    fn push_back(&mut self, item: T) -> Result<(), ContainerError> {
        let len = self.session.len();
        let required = len.checked_add(1).ok_or(ContainerError::Capacity {
            requested: len as u64 + 1,
            limit: u32::MAX as u64,
        })?;

        self.request_room(required)?;
        self.map_for_write(len)?;
        self.session.write_windowed(&self.cursor.window, len, &item)?;
        self.session.set_len(required);
        self.cursor.stats.elements_written += 1;
        Ok(())
    }

    fn reserve(&mut self, count: u32) -> Result<(), ContainerError> {
        self.request_room(count)
    }

    fn clear(&mut self) {
        self.session.set_len(0);
    }

    fn truncate(&mut self, count: u32) {
        if count < self.session.len() {
            self.session.set_len(count);
        }
    }

    fn size(&self) -> u32 {
        self.session.len()
    }

    fn end_write(mut self) -> Result<(), ContainerError> {
        self.session.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{channel::HeapChannel, owner::SharedSequence};
    use meshvec_core::{collect_batch, RenderMesh};

    fn owner_with(count: u32) -> SharedSequence<RenderMesh, HeapChannel> {
        let config = SequenceConfig {
            initial_capacity: 4,
            ..Default::default()
        };
        let mut owner =
            SharedSequence::create(HeapChannel::from_config(&config), &config).unwrap();
        owner
            .start_write()
            .unwrap()
            .extend((0..count).map(|i| RenderMesh::new(i, i, 3)))
            .unwrap();
        owner
    }

    #[test]
    fn test_attach_rejects_zero_window() {
        let owner = owner_with(1);
        let err = WindowedView::<RenderMesh, _>::attach(owner.channel().clone(), 0)
            .err()
            .unwrap();
        assert!(matches!(err, ContainerError::Config(_)));
    }

    #[test]
    fn test_attach_maps_first_window() {
        let owner = owner_with(5);
        let view = owner.view(2).unwrap();

        assert_eq!((view.window().start(), view.window().end()), (0, 2));
        assert_eq!(view.stats().maps, 1);
        assert_eq!(view.iter_state(), IterState::NotStarted);
    }

    #[test]
    fn test_first_then_next_yields_first_once() {
        let owner = owner_with(3);
        let expected = owner.to_vec().unwrap();
        let mut view = owner.view(1).unwrap();

        let mut reader = view.start_read().unwrap();
        reader.restart();
        assert_eq!(reader.first(), Some(expected[0]));
        assert_eq!(reader.next(), Some(expected[0]));
        assert_eq!(reader.next(), Some(expected[1]));
        // A later peek does not rewind the cursor.
        assert_eq!(reader.first(), Some(expected[0]));
        assert_eq!(reader.next(), Some(expected[2]));
        assert!(reader.at_end());
        assert_eq!(reader.next(), None);
    }

    #[test]
    fn test_window_moves_forward_during_iteration() {
        let owner = owner_with(5);
        let mut view = owner.view(2).unwrap();

        let batch = collect_batch(&mut view).unwrap();

        assert_eq!(batch, owner.to_vec().unwrap());
        // [0, 2) at attach, then [2, 4) and [4, 5).
        assert_eq!(view.stats().remaps, 2);
        assert_eq!((view.window().start(), view.window().end()), (4, 5));
    }

    #[test]
    fn test_push_back_through_view() {
        let owner = owner_with(2);
        let mut view = owner.view(8).unwrap();

        let mut writer = view.start_write().unwrap();
        writer.push_back(RenderMesh::new(7, 7, 3)).unwrap();
        assert_eq!(writer.size(), 3);
        writer.end_write().unwrap();

        let stored = owner.to_vec().unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[2].vertex_buffer, 7);
        assert_eq!(view.stats().elements_written, 1);
    }

    #[test]
    fn test_growth_requested_by_view() {
        let owner = owner_with(4);
        let mut view = owner.view(2).unwrap();

        view.start_write()
            .unwrap()
            .extend((10..14).map(|i| RenderMesh::new(i, i, 3)))
            .unwrap();

        assert_eq!(view.stats().growth_requests, 1, "4 -> 260 elements");
        assert_eq!(collect_batch(&mut view).unwrap().len(), 8);
        // The owner handle only counts its own growth.
        assert_eq!(owner.stats().growth_events, 0);
    }

    #[test]
    fn test_clone_copies_the_descriptor() {
        let owner = owner_with(3);
        let mut view = owner.view(1).unwrap();
        {
            let mut reader = view.start_read().unwrap();
            reader.restart();
            reader.next();
        }

        let copy = view.clone();
        assert_eq!(copy.window(), view.window());
        assert_eq!(copy.iter_state(), IterState::Consumed(0));
    }
}
