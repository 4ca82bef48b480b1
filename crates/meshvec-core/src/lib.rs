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

//! # Meshvec Core
//!
//! Foundational crate containing the renderable-mesh descriptor, its batching keys,
//! and the ordered container contracts shared by every storage backend.
//!
//! The renderer only ever talks to the traits in [`container`]. Whether the batch
//! lives in a plain in-process array ([`LocalContainer`]) or in a shared-memory
//! segment owned by another process (the `meshvec-ipc` crate) is invisible at that
//! seam.

#![warn(missing_docs)]

pub mod container;
pub mod error;
pub mod local;
pub mod mesh;

pub use container::{
    collect_batch, OrderedContainer, RandomAccessContainer, SequenceRead, SequenceWrite,
};
pub use error::ContainerError;
pub use local::{LocalContainer, LocalReader, LocalWriter};
pub use mesh::{BatchKeys, RenderMesh};
