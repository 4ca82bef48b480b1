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

//! The owner side of a shared sequence.

use crate::{
    channel::{ChannelError, SegmentRead, SegmentWrite, SharedChannel},
    config::SequenceConfig,
    header::{SequenceHeader, SEQUENCE_MAGIC},
    protocol::{element_stride, ReadSession, WriteSession},
    stats::GrowthStats,
    view::WindowedView,
};
use bytemuck::Pod;
use meshvec_core::{
    BatchKeys, ContainerError, OrderedContainer, RandomAccessContainer, SequenceRead,
    SequenceWrite,
};
use std::marker::PhantomData;

/// The authoritative copy of a sequence, placed in a shared-memory segment.
///
/// The owner is the only party allowed to reorder the elements, and every growth
/// of the segment goes through the owner-serviced end of the channel. Remote
/// parties read and append through a [`WindowedView`].
///
/// ```rust
/// use meshvec_core::{
///     collect_batch, OrderedContainer, RandomAccessContainer, RenderMesh, SequenceWrite,
/// };
/// use meshvec_ipc::{HeapChannel, SequenceConfig, SharedSequence};
///
/// let config = SequenceConfig::default();
/// let channel = HeapChannel::from_config(&config);
/// let mut owner = SharedSequence::<RenderMesh, _>::create(channel, &config).unwrap();
///
/// let mut writer = owner.start_write().unwrap();
/// writer.push_back(RenderMesh::new(0, 0, 3).with_state(2)).unwrap();
/// writer.push_back(RenderMesh::new(1, 1, 3).with_state(1)).unwrap();
/// writer.end_write().unwrap();
///
/// owner.sort_by_state().unwrap();
/// assert_eq!(collect_batch(&mut owner).unwrap()[0].state, 1);
/// ```
pub struct SharedSequence<T, C> {
    channel: C,
    cursor: u32,
    stats: GrowthStats,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Pod, C: SharedChannel> SharedSequence<T, C> {
    /// Lays out an empty sequence in the channel's segment.
    ///
    /// Any sequence previously stored in the segment is discarded. Views still
    /// attached to it observe a new generation and remap.
    pub fn create(channel: C, config: &SequenceConfig) -> Result<Self, ContainerError> {
        config.validate()?;
        let stride = element_stride::<T>()?;
        let capacity_error = |limit: usize| ContainerError::Capacity {
            requested: config.initial_capacity as u64,
            limit: SequenceHeader::capacity_for(stride, limit),
        };

        {
            let mut segment = channel.acquire_write()?;
            let bytes = SequenceHeader::segment_bytes(stride, config.initial_capacity)
                .ok_or_else(|| capacity_error(config.max_bytes))?;
            segment.request_growth(bytes).map_err(|err| match err {
                ChannelError::GrowthRefused { limit, .. } => capacity_error(limit),
                other => other.into(),
            })?;

            let generation = SequenceHeader::read(&segment)
                .ok()
                .filter(|previous| previous.magic == SEQUENCE_MAGIC)
                .map_or(0, |previous| previous.generation.wrapping_add(1));
            let capacity = SequenceHeader::capacity_for(stride, segment.bytes().len());
            let mut header = SequenceHeader::new(
                stride,
                u32::try_from(capacity).unwrap_or(u32::MAX),
                config.min_growth,
            );
            header.generation = generation;
            header.write(&mut segment)?;

            log::debug!(
                "Created shared sequence of {} ({} bytes per element, capacity {})",
                std::any::type_name::<T>(),
                stride,
                header.capacity
            );
        }

        Ok(Self::from_channel(channel))
    }

    /// Re-opens a sequence laid out by an earlier owner handle.
    pub fn adopt(channel: C) -> Result<Self, ContainerError> {
        {
            let session = ReadSession::<T, _>::open(channel.acquire_read()?)?;
            log::debug!(
                "Adopted shared sequence with {} elements (generation {})",
                session.len(),
                session.header().generation
            );
        }
        Ok(Self::from_channel(channel))
    }

    fn from_channel(channel: C) -> Self {
        Self {
            channel,
            cursor: 0,
            stats: GrowthStats::default(),
            _marker: PhantomData,
        }
    }

    /// The channel the sequence lives in.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Growth and sort counters.
    pub fn stats(&self) -> GrowthStats {
        self.stats
    }

    /// Copies the whole sequence out, in order, without touching the cursor.
    pub fn to_vec(&self) -> Result<Vec<T>, ContainerError> {
        let session = ReadSession::<T, _>::open(self.channel.acquire_read()?)?;
        (0..session.len()).map(|index| session.read_at(index)).collect()
    }

    /// Attaches a client view to this sequence through a clone of the channel.
    pub fn view(&self, window_len: u32) -> Result<WindowedView<T, C>, ContainerError>
    where
        C: Clone,
    {
        WindowedView::attach(self.channel.clone(), window_len)
    }

    fn sort_by_key<K, F>(&mut self, key: F) -> Result<(), ContainerError>
    where
        K: Ord,
        F: Fn(&T) -> K,
    {
        let mut session = WriteSession::<T, _>::open(self.channel.acquire_write()?)?;
        let len = session.len();
        if len < 2 {
            return Ok(());
        }

        let mut items = (0..len)
            .map(|index| session.read_at(index))
            .collect::<Result<Vec<T>, _>>()?;
        // Stable: elements with equal keys keep their relative order.
        items.sort_by_key(|item| key(item));
        for (index, item) in (0..len).zip(items.iter()) {
            session.write_at(index, item)?;
        }

        // Every position may hold a different element now.
        session.bump_generation();
        session.commit()?;
        self.stats.sorts += 1;
        Ok(())
    }
}

impl<T: Pod, C: SharedChannel> OrderedContainer for SharedSequence<T, C> {
    type Item = T;
    type Reader<'a>
        = OwnerReader<'a, T, C>
    where
        Self: 'a;
    type Writer<'a>
        = OwnerWriter<'a, T, C>
    where
        Self: 'a;

    fn start_read(&mut self) -> Result<OwnerReader<'_, T, C>, ContainerError> {
        let session = ReadSession::open(self.channel.acquire_read()?)?;
        Ok(OwnerReader {
            session,
            cursor: &mut self.cursor,
            failure: None,
        })
    }

    fn start_write(&mut self) -> Result<OwnerWriter<'_, T, C>, ContainerError> {
        let session = WriteSession::open(self.channel.acquire_write()?)?;
        Ok(OwnerWriter {
            session,
            stats: &mut self.stats,
        })
    }
}

impl<T: Pod + BatchKeys, C: SharedChannel> RandomAccessContainer for SharedSequence<T, C> {
    fn sort_by_state(&mut self) -> Result<(), ContainerError> {
        self.sort_by_key(T::state_key)
    }

    fn sort_by_texture(&mut self) -> Result<(), ContainerError> {
        self.sort_by_key(T::texture_key)
    }
}

/// Read token of a [`SharedSequence`]. Holds the channel's read bracket.
pub struct OwnerReader<'a, T, C: SharedChannel + 'a> {
    session: ReadSession<T, C::ReadGuard<'a>>,
    cursor: &'a mut u32,
    failure: Option<ContainerError>,
}

impl<T: Pod, C: SharedChannel> Iterator for OwnerReader<'_, T, C> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if *self.cursor >= self.session.len() {
            return None;
        }
        match self.session.read_at(*self.cursor) {
            Ok(item) => {
                *self.cursor += 1;
                Some(item)
            }
            Err(err) => {
                log::error!("Failed to read element {}: {err}", *self.cursor);
                self.failure = Some(err);
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.session.len().saturating_sub(*self.cursor) as usize;
        (remaining, Some(remaining))
    }
}

impl<T: Pod, C: SharedChannel> SequenceRead for OwnerReader<'_, T, C> {
    fn restart(&mut self) {
        *self.cursor = 0;
    }

    fn first(&mut self) -> Option<T> {
        if self.session.len() == 0 {
            return None;
        }
        match self.session.read_at(0) {
            Ok(item) => Some(item),
            Err(err) => {
                log::error!("Failed to read the first element: {err}");
                self.failure = Some(err);
                None
            }
        }
    }

    fn at_end(&self) -> bool {
        *self.cursor >= self.session.len()
    }

    fn size(&self) -> u32 {
        self.session.len()
    }

    fn take_error(&mut self) -> Option<ContainerError> {
        self.failure.take()
    }
}

/// Write token of a [`SharedSequence`]. Holds the channel's write bracket.
pub struct OwnerWriter<'a, T, C: SharedChannel + 'a> {
    session: WriteSession<T, C::WriteGuard<'a>>,
    stats: &'a mut GrowthStats,
}

impl<T: Pod, C: SharedChannel> OwnerWriter<'_, T, C> {
    fn grow_to(&mut self, required: u32) -> Result<(), ContainerError> {
        if self.session.ensure_capacity(required)? {
            self.stats.growth_events += 1;
        }
        Ok(())
    }
}

impl<T: Pod, C: SharedChannel> SequenceWrite for OwnerWriter<'_, T, C> {
    type Item = T;

    fn push_back(&mut self, item: T) -> Result<(), ContainerError> {
        let len = self.session.len();
        let required = len.checked_add(1).ok_or(ContainerError::Capacity {
            requested: len as u64 + 1,
            limit: u32::MAX as u64,
        })?;

        self.grow_to(required)?;
        self.session.write_at(len, &item)?;
        self.session.set_len(required);
        self.stats.elements_written += 1;
        Ok(())
    }

    fn reserve(&mut self, count: u32) -> Result<(), ContainerError> {
        self.grow_to(count)
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
    use crate::channel::HeapChannel;
    use meshvec_core::{collect_batch, RenderMesh};

    fn small_config() -> SequenceConfig {
        SequenceConfig {
            window_len: 2,
            initial_capacity: 2,
            min_growth: 1,
            max_bytes: 64 * 1024,
        }
    }

    fn meshes(count: u32) -> Vec<RenderMesh> {
        (0..count)
            .map(|i| RenderMesh::new(i, i, 3).with_state(count - i).with_texture(i % 3))
            .collect()
    }

    #[test]
    fn test_push_grows_storage() {
        // --- 1. ARRANGE ---
        let channel = HeapChannel::from_config(&small_config());
        let mut owner = SharedSequence::<RenderMesh, _>::create(channel, &small_config()).unwrap();
        let source = meshes(5);

        // --- 2. ACT ---
        let mut writer = owner.start_write().unwrap();
        for mesh in &source {
            writer.push_back(*mesh).unwrap();
        }
        writer.end_write().unwrap();

        // --- 3. ASSERT ---
        assert_eq!(owner.to_vec().unwrap(), source);
        assert_eq!(owner.stats().growth_events, 2, "2 -> 4 -> 8");
        assert_eq!(owner.stats().elements_written, 5);
    }

    #[test]
    fn test_dropped_writer_still_publishes() {
        let channel = HeapChannel::new(64 * 1024);
        let mut owner = SharedSequence::<RenderMesh, _>::create(channel, &small_config()).unwrap();

        owner
            .start_write()
            .unwrap()
            .push_back(RenderMesh::new(1, 1, 3))
            .unwrap();

        assert_eq!(owner.to_vec().unwrap().len(), 1);
    }

    #[test]
    fn test_adopt_sees_existing_elements() {
        let channel = HeapChannel::new(64 * 1024);
        let mut owner =
            SharedSequence::<RenderMesh, _>::create(channel.clone(), &small_config()).unwrap();
        owner
            .start_write()
            .unwrap()
            .extend(meshes(3))
            .unwrap();

        let mut adopted = SharedSequence::<RenderMesh, _>::adopt(channel).unwrap();
        assert_eq!(collect_batch(&mut adopted).unwrap(), meshes(3));
    }

    #[test]
    fn test_adopt_rejects_other_element_type() {
        let channel = HeapChannel::new(64 * 1024);
        let _owner =
            SharedSequence::<RenderMesh, _>::create(channel.clone(), &small_config()).unwrap();

        let err = SharedSequence::<u64, _>::adopt(channel).err().unwrap();
        assert!(matches!(err, ContainerError::Layout(_)));
    }

    #[test]
    fn test_create_beyond_budget_is_capacity_error() {
        let config = SequenceConfig {
            initial_capacity: 1000,
            max_bytes: 1024,
            ..small_config()
        };
        let channel = HeapChannel::from_config(&config);

        let err = SharedSequence::<RenderMesh, _>::create(channel, &config)
            .err()
            .unwrap();
        assert!(err.is_capacity_class());
    }

    #[test]
    fn test_sort_by_texture_is_stable() {
        let channel = HeapChannel::new(64 * 1024);
        let mut owner = SharedSequence::<RenderMesh, _>::create(channel, &small_config()).unwrap();
        owner.start_write().unwrap().extend(meshes(9)).unwrap();

        owner.sort_by_texture().unwrap();

        let sorted = owner.to_vec().unwrap();
        assert!(sorted.windows(2).all(|w| w[0].texture <= w[1].texture));
        // Within one texture, the original order (descending state) survives.
        let states: Vec<u32> = sorted
            .iter()
            .filter(|m| m.texture == 0)
            .map(|m| m.state)
            .collect();
        assert_eq!(states, vec![9, 6, 3]);
        assert_eq!(owner.stats().sorts, 1);
    }

    #[test]
    fn test_cursor_survives_brackets() {
        let channel = HeapChannel::new(64 * 1024);
        let mut owner = SharedSequence::<RenderMesh, _>::create(channel, &small_config()).unwrap();
        let source = meshes(3);
        owner.start_write().unwrap().extend(source.clone()).unwrap();

        {
            let mut reader = owner.start_read().unwrap();
            reader.restart();
            assert_eq!(reader.first(), Some(source[0]));
            assert_eq!(reader.next(), Some(source[0]));
            reader.end_read();
        }

        let mut reader = owner.start_read().unwrap();
        assert_eq!(reader.next(), Some(source[1]));
        assert_eq!(reader.next(), Some(source[2]));
        assert!(reader.at_end());
        assert_eq!(reader.next(), None);
    }
}
