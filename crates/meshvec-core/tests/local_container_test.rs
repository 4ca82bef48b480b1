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

use meshvec_core::{
    collect_batch, LocalContainer, OrderedContainer, RandomAccessContainer, RenderMesh,
    SequenceRead, SequenceWrite,
};

/// A consumer written only against the container contracts, the way the renderer is.
fn count_state_changes<C>(container: &mut C) -> u32
where
    C: OrderedContainer,
    C::Item: std::borrow::Borrow<RenderMesh>,
{
    use std::borrow::Borrow;

    let mut reader = container.start_read().unwrap();
    reader.restart();

    let mut changes = 0;
    let mut last_state = None;
    while let Some(item) = reader.next() {
        let state = item.borrow().state;
        if last_state != Some(state) {
            changes += 1;
            last_state = Some(state);
        }
    }
    changes
}

#[test]
fn test_sorting_reduces_state_changes() {
    // --- 1. ARRANGE ---
    let meshes: Vec<RenderMesh> = (0..12)
        .map(|i| RenderMesh::new(i, i, 6).with_state(i % 3))
        .collect();
    let mut container = LocalContainer::new();
    {
        let mut writer = container.start_write().unwrap();
        let appended = writer.extend(meshes.iter()).unwrap();
        assert_eq!(appended, 12);
        writer.end_write().unwrap();
    }

    // --- 2. ACT & ASSERT ---
    assert_eq!(count_state_changes(&mut container), 12);

    container.sort_by_state().unwrap();
    assert_eq!(
        count_state_changes(&mut container),
        3,
        "Sorted batch should switch state once per bucket"
    );
}

#[test]
fn test_at_end_after_exactly_size_calls() {
    let meshes: Vec<RenderMesh> = (0..4).map(|i| RenderMesh::new(i, i, 3)).collect();
    let mut container = LocalContainer::from_vec(meshes);

    let mut reader = container.start_read().unwrap();
    reader.restart();
    let size = reader.size();
    for _ in 0..size {
        assert!(!reader.at_end());
        assert!(reader.next().is_some());
    }
    assert!(reader.at_end());
}

#[test]
fn test_push_during_iteration_does_not_disturb_visited_elements() {
    let meshes: Vec<RenderMesh> = (0..3).map(|i| RenderMesh::new(i, i, 3)).collect();
    let extra = RenderMesh::new(99, 99, 3);
    let mut container = LocalContainer::from_vec(meshes.clone());

    {
        let mut reader = container.start_read().unwrap();
        reader.restart();
        assert_eq!(reader.next(), Some(meshes[0]));
    }
    container.start_write().unwrap().push_back(extra).unwrap();

    let mut reader = container.start_read().unwrap();
    let rest: Vec<RenderMesh> = reader.by_ref().collect();
    assert_eq!(rest, vec![meshes[1], meshes[2], extra]);

    reader.restart();
    assert_eq!(reader.count(), 4);
}

#[test]
fn test_collect_batch_empty() {
    let mut container: LocalContainer<RenderMesh> = LocalContainer::default();
    assert!(collect_batch(&mut container).unwrap().is_empty());
}
