//! Hyperparameter configurations and their identity.
//!
//! - `HyperParams`: one point of the search space.
//! - `ParamKey`: bit-exact hashable key, so two configurations are the same
//!   trial iff every field is identical (learning rates compared by bits).
//! - `ParamHash`: BLAKE3 fingerprint used in artifact metadata.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One model configuration: lag depth plus the boosted-tree parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperParams {
    pub lags: usize,
    pub max_depth: usize,
    pub n_estimators: usize,
    pub learning_rate: f64,
}

impl HyperParams {
    pub fn key(&self) -> ParamKey {
        ParamKey {
            lags: self.lags,
            max_depth: self.max_depth,
            n_estimators: self.n_estimators,
            learning_rate_bits: self.learning_rate.to_bits(),
        }
    }

    pub fn fingerprint(&self) -> ParamHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.lags as u64).to_le_bytes());
        hasher.update(&(self.max_depth as u64).to_le_bytes());
        hasher.update(&(self.n_estimators as u64).to_le_bytes());
        hasher.update(&self.learning_rate.to_bits().to_le_bytes());
        ParamHash(*hasher.finalize().as_bytes())
    }
}

impl fmt::Display for HyperParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lags={} depth={} n_estimators={} lr={:.6}",
            self.lags, self.max_depth, self.n_estimators, self.learning_rate
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamKey {
    lags: usize,
    max_depth: usize,
    n_estimators: usize,
    learning_rate_bits: u64,
}

impl From<&HyperParams> for ParamKey {
    fn from(params: &HyperParams) -> Self {
        params.key()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamHash(pub [u8; 32]);

impl ParamHash {
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}
