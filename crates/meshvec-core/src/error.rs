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

//! Defines the error type shared by every container backend.

use thiserror::Error;

/// An error returned by a container operation.
///
/// Programmer errors (iterating outside a read bracket, sorting a windowed view)
/// are not represented here: the container API makes them impossible to express.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    /// The backing storage could not grow to hold the requested number of elements.
    /// The container is left unchanged.
    #[error("Cannot grow sequence to {requested} elements (limit: {limit})")]
    Capacity {
        /// The number of elements that was asked for.
        requested: u64,
        /// The largest number of elements the storage can hold.
        limit: u64,
    },
    /// The shared channel backing the container could not be reached.
    #[error("Shared channel unavailable: {0}")]
    ChannelUnavailable(String),
    /// The storage does not hold a sequence of the expected element layout.
    #[error("Incompatible sequence layout: {0}")]
    Layout(String),
    /// A container was configured with invalid parameters.
    #[error("Invalid container configuration: {0}")]
    Config(String),
}

impl ContainerError {
    /// Returns `true` for failures the caller may recover from by freeing capacity
    /// or re-establishing the channel and retrying.
    ///
    /// A lost channel counts as a capacity failure: the storage the operation needed
    /// is simply not there anymore.
    pub fn is_capacity_class(&self) -> bool {
        matches!(
            self,
            ContainerError::Capacity { .. } | ContainerError::ChannelUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_error_display() {
        let err = ContainerError::Capacity {
            requested: 10,
            limit: 8,
        };
        assert_eq!(
            format!("{err}"),
            "Cannot grow sequence to 10 elements (limit: 8)"
        );

        let err = ContainerError::Layout("stride mismatch".to_string());
        assert_eq!(
            format!("{err}"),
            "Incompatible sequence layout: stride mismatch"
        );
    }

    #[test]
    fn capacity_class_covers_lost_channel() {
        assert!(ContainerError::Capacity {
            requested: 1,
            limit: 0
        }
        .is_capacity_class());
        assert!(ContainerError::ChannelUnavailable("gone".into()).is_capacity_class());
        assert!(!ContainerError::Layout("bad magic".into()).is_capacity_class());
        assert!(!ContainerError::Config("zero window".into()).is_capacity_class());
    }
}
