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

//! The ordered container contracts.
//!
//! Every backend exposes the same two access brackets. A bracket is opened with
//! [`OrderedContainer::start_read`] or [`OrderedContainer::start_write`] and is
//! represented by the returned token; it is closed by [`SequenceRead::end_read`],
//! [`SequenceWrite::end_write`], or simply by dropping the token on any exit path.
//!
//! Iteration only exists on the read token and mutation only on the write token,
//! so reading or writing outside a bracket cannot be expressed. Both tokens borrow
//! the container mutably, which also rules out a write while a read is open.
//!
//! ```text
//! start_read ──> restart / first / next / at_end / size ──> end_read
//! start_write ─> push_back / reserve / truncate / clear ──> end_write
//! ```

use crate::error::ContainerError;

/// A sequence of elements that can be read and appended through access brackets.
pub trait OrderedContainer {
    /// The element type handed out by readers and accepted by writers.
    type Item;

    /// The read-bracket token.
    type Reader<'a>: SequenceRead<Item = Self::Item>
    where
        Self: 'a;

    /// The write-bracket token.
    type Writer<'a>: SequenceWrite<Item = Self::Item>
    where
        Self: 'a;

    /// Opens a read bracket. May block while the other side holds a write bracket.
    fn start_read(&mut self) -> Result<Self::Reader<'_>, ContainerError>;

    /// Opens a write bracket. May block while the other side holds any bracket.
    fn start_write(&mut self) -> Result<Self::Writer<'_>, ContainerError>;
}

/// Sequential read access, valid for the lifetime of a read bracket.
///
/// [`Iterator::next`] returns the element at the cursor and advances it. The cursor
/// survives the bracket: a later read bracket continues where this one stopped
/// unless [`restart`](SequenceRead::restart) is called.
pub trait SequenceRead: Iterator {
    /// Moves the cursor back to the first element.
    fn restart(&mut self);

    /// Returns the first element, or `None` if the sequence is empty.
    fn first(&mut self) -> Option<Self::Item>;

    /// Returns `true` once every element has been returned by `next`.
    fn at_end(&self) -> bool;

    /// Number of elements in the sequence.
    fn size(&self) -> u32;

    /// Takes the failure that made `next` or `first` return `None` before the
    /// end of the sequence, if any.
    fn take_error(&mut self) -> Option<ContainerError> {
        None
    }

    /// Closes the read bracket.
    fn end_read(self)
    where
        Self: Sized,
    {
        drop(self);
    }
}

/// Append and resize access, valid for the lifetime of a write bracket.
pub trait SequenceWrite {
    /// The element type accepted by the writer.
    type Item;

    /// Appends an element.
    ///
    /// # Errors
    ///
    /// Returns a capacity-class [`ContainerError`] when the storage cannot grow.
    /// The size is unchanged in that case.
    fn push_back(&mut self, item: Self::Item) -> Result<(), ContainerError>;

    /// Makes room for at least `count` elements without touching existing ones.
    fn reserve(&mut self, count: u32) -> Result<(), ContainerError>;

    /// Removes every element.
    fn clear(&mut self);

    /// Drops every element at position `count` and beyond. No-op if
    /// `count >= size()`.
    fn truncate(&mut self, count: u32);

    /// Number of elements in the sequence.
    fn size(&self) -> u32;

    /// Appends every element of `items`, stopping at the first failure.
    ///
    /// Returns the number of elements appended.
    fn extend<I>(&mut self, items: I) -> Result<u32, ContainerError>
    where
        I: IntoIterator<Item = Self::Item>,
        Self: Sized,
    {
        let mut appended = 0;
        for item in items {
            self.push_back(item)?;
            appended += 1;
        }
        Ok(appended)
    }

    /// Closes the write bracket and publishes the new contents.
    fn end_write(self) -> Result<(), ContainerError>
    where
        Self: Sized,
    {
        drop(self);
        Ok(())
    }
}

/// A container that owns the whole storage and may therefore reorder it.
///
/// Remote windowed views do not implement this trait: a party that only maps part
/// of the sequence cannot reorder what it does not see.
pub trait RandomAccessContainer: OrderedContainer {
    /// Stable sort by ascending render-state key.
    fn sort_by_state(&mut self) -> Result<(), ContainerError>;

    /// Stable sort by ascending texture key.
    fn sort_by_texture(&mut self) -> Result<(), ContainerError>;
}

/// Reads a whole container from the first element, in order.
///
/// This is the consumer side of the render-batch boundary: it works the same way
/// for every backend.
pub fn collect_batch<C>(container: &mut C) -> Result<Vec<C::Item>, ContainerError>
where
    C: OrderedContainer,
{
    let mut reader = container.start_read()?;
    reader.restart();

    let size = reader.size();
    let mut batch = Vec::with_capacity(size as usize);
    while !reader.at_end() {
        match reader.next() {
            Some(item) => batch.push(item),
            None => {
                return Err(reader.take_error().unwrap_or_else(|| {
                    ContainerError::Layout(format!(
                        "read stopped after {} of {size} elements",
                        batch.len()
                    ))
                }))
            }
        }
    }

    reader.end_read();
    Ok(batch)
}
