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

//! The in-process container backend.

use crate::{
    container::{OrderedContainer, RandomAccessContainer, SequenceRead, SequenceWrite},
    error::ContainerError,
    mesh::BatchKeys,
};

/// A plain dynamic array with an iteration cursor.
///
/// This is the reference behaviour the shared-memory backends must match from the
/// consumer's point of view. Access brackets cost nothing here: there is no other
/// process to coordinate with, so the tokens only borrow the container.
///
/// `T` is usually a borrowed descriptor (`&RenderMesh`) so building a batch does
/// not copy the meshes themselves.
#[derive(Debug, Clone)]
pub struct LocalContainer<T> {
    items: Vec<T>,
    cursor: usize,
}

impl<T> LocalContainer<T> {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
        }
    }

    /// Creates an empty container able to hold `capacity` elements without
    /// reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    /// Takes ownership of an existing vector.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self { items, cursor: 0 }
    }

    /// Returns the elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Iterates over the elements without touching the cursor.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Number of elements the container can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Consumes the container and returns the backing vector.
    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T> Default for LocalContainer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for LocalContainer<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_vec(items)
    }
}

impl<T: Clone> OrderedContainer for LocalContainer<T> {
    type Item = T;
    type Reader<'a>
        = LocalReader<'a, T>
    where
        Self: 'a;
    type Writer<'a>
        = LocalWriter<'a, T>
    where
        Self: 'a;

    fn start_read(&mut self) -> Result<LocalReader<'_, T>, ContainerError> {
        Ok(LocalReader {
            items: &self.items,
            cursor: &mut self.cursor,
        })
    }

    fn start_write(&mut self) -> Result<LocalWriter<'_, T>, ContainerError> {
        Ok(LocalWriter {
            items: &mut self.items,
        })
    }
}

impl<T: Clone + BatchKeys> RandomAccessContainer for LocalContainer<T> {
    fn sort_by_state(&mut self) -> Result<(), ContainerError> {
        self.items.sort_by_key(|a| a.state_key());
        Ok(())
    }

    fn sort_by_texture(&mut self) -> Result<(), ContainerError> {
        self.items.sort_by_key(|a| a.texture_key());
        Ok(())
    }
}

/// Read token of a [`LocalContainer`].
#[derive(Debug)]
pub struct LocalReader<'a, T> {
    items: &'a [T],
    cursor: &'a mut usize,
}

impl<T: Clone> Iterator for LocalReader<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let item = self.items.get(*self.cursor)?.clone();
        *self.cursor += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.items.len().saturating_sub(*self.cursor);
        (remaining, Some(remaining))
    }
}

impl<T: Clone> SequenceRead for LocalReader<'_, T> {
    fn restart(&mut self) {
        *self.cursor = 0;
    }

    fn first(&mut self) -> Option<T> {
        self.items.first().cloned()
    }

    fn at_end(&self) -> bool {
        *self.cursor >= self.items.len()
    }

    fn size(&self) -> u32 {
        len_u32(self.items.len())
    }
}

/// Write token of a [`LocalContainer`].
#[derive(Debug)]
pub struct LocalWriter<'a, T> {
    items: &'a mut Vec<T>,
}

impl<T> SequenceWrite for LocalWriter<'_, T> {
    type Item = T;

    fn push_back(&mut self, item: T) -> Result<(), ContainerError> {
        // Sizes are reported as u32 on every backend.
        if self.items.len() >= u32::MAX as usize {
            return Err(ContainerError::Capacity {
                requested: self.items.len() as u64 + 1,
                limit: u32::MAX as u64,
            });
        }
        self.items.push(item);
        Ok(())
    }

    fn reserve(&mut self, count: u32) -> Result<(), ContainerError> {
        let additional = (count as usize).saturating_sub(self.items.len());
        self.items
            .try_reserve(additional)
            .map_err(|_| ContainerError::Capacity {
                requested: count as u64,
                limit: self.items.capacity() as u64,
            })
    }

    fn clear(&mut self) {
        self.items.clear();
    }

    fn truncate(&mut self, count: u32) {
        self.items.truncate(count as usize);
    }

    fn size(&self) -> u32 {
        len_u32(self.items.len())
    }
}

fn len_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
