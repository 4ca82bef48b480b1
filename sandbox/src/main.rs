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

// Meshvec Sandbox
// Fills a shared sequence on one thread and consumes it through a small window
// on another, the way the renderer and its out-of-process worker do.
//
// Usage: sandbox [config.json]

use anyhow::{anyhow, Result};
use meshvec_core::{
    OrderedContainer, RandomAccessContainer, RenderMesh, SequenceRead, SequenceWrite,
};
use meshvec_ipc::{HeapChannel, SequenceConfig, SharedSequence, WindowedView};

const MESH_COUNT: u32 = 4_096;
const CHUNK: usize = 512;

fn load_config() -> Result<SequenceConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading sequence configuration from {path}");
            SequenceConfig::from_file(&path).map_err(|err| anyhow!("{path}: {err}"))
        }
        None => Ok(SequenceConfig {
            window_len: 32,
            initial_capacity: 256,
            ..Default::default()
        }),
    }
}

fn terrain_patch(index: u32) -> RenderMesh {
    let x = (index % 64) as f32 * 16.0;
    let z = (index / 64) as f32 * 16.0;
    RenderMesh::new(index, index, 384)
        .with_state(index % 5)
        .with_texture(index % 12)
        .with_bounds([x + 8.0, 0.0, z + 8.0], 11.4)
}

/// Walks the batch the way a draw loop does, counting texture rebinds.
fn draw<C>(container: &mut C) -> Result<(u32, u32)>
where
    C: OrderedContainer<Item = RenderMesh>,
{
    let mut reader = container.start_read()?;
    reader.restart();

    let mut triangles = 0;
    let mut rebinds = 0;
    let mut bound = None;
    while !reader.at_end() {
        let Some(mesh) = reader.next() else { break };
        if bound != Some(mesh.texture) {
            rebinds += 1;
            bound = Some(mesh.texture);
        }
        triangles += mesh.triangle_count();
    }
    reader.end_read();
    Ok((triangles, rebinds))
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    config.validate()?;
    log::info!("Sequence configuration: {}", serde_json::to_string(&config)?);

    let channel = HeapChannel::from_config(&config);
    let mut owner = SharedSequence::<RenderMesh, _>::create(channel.clone(), &config)?;
    let mut view = WindowedView::<RenderMesh, _>::attach_with_config(channel, &config)?;

    // Producer and consumer share nothing but the channel.
    std::thread::scope(|scope| -> Result<()> {
        let producer = scope.spawn(|| -> Result<()> {
            let patches: Vec<RenderMesh> = (0..MESH_COUNT).map(terrain_patch).collect();
            for chunk in patches.chunks(CHUNK) {
                let mut writer = owner.start_write()?;
                writer.extend(chunk.iter().copied())?;
                writer.end_write()?;
            }
            owner.sort_by_texture()?;
            log::info!("Producer done: {}", serde_json::to_string(&owner.stats())?);
            Ok(())
        });

        // Partial batches are consistent prefixes of what was published so far.
        while !producer.is_finished() {
            let (triangles, _) = draw(&mut view)?;
            log::debug!("Consumer saw {triangles} triangles so far");
            std::thread::yield_now();
        }
        producer
            .join()
            .map_err(|_| anyhow!("producer thread panicked"))??;

        let (triangles, rebinds) = draw(&mut view)?;
        log::info!("Consumer drew {triangles} triangles with {rebinds} texture rebinds");
        log::info!("Consumer window: {}", serde_json::to_string(&view.stats())?);
        Ok(())
    })?;

    Ok(())
}
