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

//! # Meshvec IPC
//!
//! Shares one ordered sequence of fixed-size elements between an owner and any
//! number of clients through a shared-memory segment.
//!
//! - [`SharedSequence`] is the owner side. It lays the sequence out in the
//!   segment, services growth and is the only side allowed to sort.
//! - [`WindowedView`] is the client side. It maps a bounded window of the
//!   sequence and slides it as iteration or appends cross its boundary.
//!
//! Both implement the container contracts of `meshvec-core`, so a consumer
//! written against [`OrderedContainer`](meshvec_core::OrderedContainer) cannot
//! tell them apart from a [`LocalContainer`](meshvec_core::LocalContainer).

#![warn(missing_docs)]

pub mod channel;
pub mod config;
pub mod header;
pub mod owner;
pub mod protocol;
pub mod stats;
pub mod view;

pub use channel::{ChannelError, HeapChannel, SegmentRead, SegmentWrite, SharedChannel};
pub use config::SequenceConfig;
pub use header::{SequenceHeader, HEADER_SIZE};
pub use owner::{OwnerReader, OwnerWriter, SharedSequence};
pub use protocol::{IterState, Window};
pub use stats::{GrowthStats, WindowStats};
pub use view::{ViewReader, ViewWriter, WindowedView};

use meshvec_core::ContainerError;

impl From<ChannelError> for ContainerError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Disconnected | ChannelError::Poisoned => {
                ContainerError::ChannelUnavailable(err.to_string())
            }
            ChannelError::OutOfRange { .. } => ContainerError::Layout(err.to_string()),
            ChannelError::GrowthRefused { requested, limit } => ContainerError::Capacity {
                requested: requested as u64,
                limit: limit as u64,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_errors_map_to_container_errors() {
        let lost: ContainerError = ChannelError::Disconnected.into();
        assert!(lost.is_capacity_class());

        let refused: ContainerError = ChannelError::GrowthRefused {
            requested: 128,
            limit: 64,
        }
        .into();
        assert!(refused.is_capacity_class());

        let out_of_range: ContainerError = ChannelError::OutOfRange {
            start: 0,
            end: 8,
            len: 4,
        }
        .into();
        assert!(matches!(out_of_range, ContainerError::Layout(_)));
    }
}
