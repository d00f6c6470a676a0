//! VM tuning knobs

use serde::{Deserialize, Serialize};

use crate::error::VmError;
use crate::gc::DEFAULT_GC_THRESHOLD;

/// Limits and host conventions for one VM instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Context-stack depth at which a new frame is refused
    pub max_call_depth: usize,
    /// Nesting limit for host entries (`Vm::call`, getters, setters,
    /// `call`/`apply` from natives); each one recurses on the native stack
    pub max_host_depth: usize,
    /// Bound on prototype-chain walks
    pub max_prototype_depth: usize,
    /// Net allocations between automatic collections (0 = never)
    pub gc_threshold: usize,
    /// Extension substituted into `loadMovie` / `attachMovie` URLs
    pub movie_extension: String,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
            max_host_depth: 32,
            max_prototype_depth: 128,
            gc_threshold: DEFAULT_GC_THRESHOLD,
            movie_extension: ".apt".to_string(),
        }
    }
}

impl VmConfig {
    pub fn from_json_str(json: &str) -> Result<Self, VmError> {
        serde_json::from_str(json)
            .map_err(|e| VmError::InvalidConfig { message: e.to_string() })
    }
}
