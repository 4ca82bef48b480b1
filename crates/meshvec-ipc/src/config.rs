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

//! Configuration for shared sequences and their windows.

use meshvec_core::ContainerError;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::header::HEADER_SIZE;

/// Tuning parameters for a shared sequence and its views.
///
/// None of these affect what a consumer observes; they only trade memory for
/// fewer remaps and growth events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Number of elements a client view maps at once.
    pub window_len: u32,
    /// Element capacity reserved when the owner creates the sequence.
    pub initial_capacity: u32,
    /// Smallest number of elements added by a growth event.
    pub min_growth: u32,
    /// Largest segment the owner agrees to map, header included, in bytes.
    pub max_bytes: usize,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            window_len: 256,
            initial_capacity: 1024,
            min_growth: 256,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

impl SequenceConfig {
    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Checks that the parameters describe a usable sequence.
    pub fn validate(&self) -> Result<(), ContainerError> {
        if self.window_len == 0 {
            return Err(ContainerError::Config(
                "window_len must be at least one element".to_string(),
            ));
        }
        if self.min_growth == 0 {
            return Err(ContainerError::Config(
                "min_growth must be at least one element".to_string(),
            ));
        }
        if self.max_bytes < HEADER_SIZE {
            return Err(ContainerError::Config(format!(
                "max_bytes ({}) cannot hold the {HEADER_SIZE}-byte sequence header",
                self.max_bytes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SequenceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let config = SequenceConfig {
            window_len: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ContainerError::Config(_)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SequenceConfig::from_json(r#"{ "window_len": 4 }"#).unwrap();
        assert_eq!(config.window_len, 4);
        assert_eq!(config.initial_capacity, SequenceConfig::default().initial_capacity);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sequence.json");
        let config = SequenceConfig {
            window_len: 8,
            initial_capacity: 16,
            min_growth: 4,
            max_bytes: 4096,
        };

        config.to_file(&path).unwrap();
        assert_eq!(SequenceConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sequence.json");
        std::fs::write(&path, r#"{ "min_growth": 0 }"#).unwrap();

        assert!(SequenceConfig::from_file(&path).is_err());
    }
}
