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

//! Counters describing how a sequence and its windows behaved.
//!
//! Both structures are plain snapshots. They are meant to be logged or forwarded
//! to a telemetry sink, never used to drive behaviour.

use serde::Serialize;

/// Counters kept by a [`WindowedView`](crate::WindowedView).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowStats {
    // --- Mapping ---
    /// Number of times a window was mapped while none was mapped before.
    pub maps: u64,
    /// Number of times a mapped window was replaced by another range.
    pub remaps: u64,
    /// Number of read or write brackets that found the window stale because the
    /// owner grew or reordered the storage.
    pub invalidations: u64,

    // --- Traffic ---
    /// Number of growth requests sent to the owner.
    pub growth_requests: u64,
    /// Number of elements copied out of the segment.
    pub elements_read: u64,
    /// Number of elements written into the segment.
    pub elements_written: u64,
}

impl WindowStats {
    /// Mappings of any kind.
    pub fn total_mappings(&self) -> u64 {
        self.maps + self.remaps
    }
}

/// Counters kept by a [`SharedSequence`](crate::SharedSequence).
///
/// Only operations performed through the owner handle are counted. Growth a view
/// asks for shows up in that view's [`WindowStats::growth_requests`] instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GrowthStats {
    /// Number of times the owner's own writer enlarged the segment.
    pub growth_events: u64,
    /// Number of sorts performed.
    pub sorts: u64,
    /// Number of elements appended by the owner.
    pub elements_written: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_serialize_to_json() {
        let stats = WindowStats {
            maps: 1,
            remaps: 2,
            ..Default::default()
        };

        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["remaps"], 2);
        assert_eq!(stats.total_mappings(), 3);
    }
}
