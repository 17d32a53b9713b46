//! JSON snapshot persistence for trained policies.
//!
//! Snapshots live under a store root directory, one file per key. Loading
//! validates the snapshot against the dimensionality the caller needs, so a
//! model trained for one grid cannot silently drive another.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reinforce::PolicyNetwork;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no saved model under key {0:?}")]
    NotFound(String),
    #[error("saved model is {saved_in}x{saved_out} but {want_in}x{want_out} is required")]
    Incompatible { saved_in: usize, saved_out: usize, want_in: usize, want_out: usize },
    #[error("saved model has an inconsistent layer layout")]
    Malformed,
    #[error("model store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("model file corrupt: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
pub struct SavedDense {
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
    pub in_dim: usize,
    pub out_dim: usize,
}

#[derive(Serialize, Deserialize)]
pub struct SavedPolicy {
    pub state_size: usize,
    pub action_size: usize,
    pub layers: Vec<SavedDense>,
}

pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    pub fn save(&self, policy: &PolicyNetwork, key: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)?;
        let json = serde_json::to_string_pretty(&policy.to_saved())?;
        fs::write(self.path_for(key), json)?;
        Ok(())
    }

    /// Loads the snapshot under `key`, rejecting it when its dimensionality
    /// disagrees with `(state_size, action_size)`.
    pub fn load(
        &self,
        key: &str,
        state_size: usize,
        action_size: usize,
        learning_rate: f32,
    ) -> Result<PolicyNetwork, StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        let saved: SavedPolicy = serde_json::from_str(&fs::read_to_string(&path)?)?;
        if saved.state_size != state_size || saved.action_size != action_size {
            return Err(StoreError::Incompatible {
                saved_in: saved.state_size,
                saved_out: saved.action_size,
                want_in: state_size,
                want_out: action_size,
            });
        }
        PolicyNetwork::from_saved(saved, learning_rate).ok_or(StoreError::Malformed)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
