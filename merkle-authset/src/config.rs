//! Tuning knobs for the materializer. They change how fast digests are
//! computed, never which digests come out.
//!
//! Each knob is local to the thread that sets it. An environment variable,
//! if present and parseable, overrides whatever a thread sets.

use std::cell::RefCell;

thread_local! {
    static CONFIG: RefCell<Config> = RefCell::new(Config::new());
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Config {
    materialize_parallelization_cutoff: MaterializeParallelizationCutoff,
}

impl Config {
    fn new() -> Self {
        Self {
            materialize_parallelization_cutoff: MaterializeParallelizationCutoff::new(None),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct MaterializeParallelizationCutoff(usize);

impl MaterializeParallelizationCutoff {
    const ENV_VAR: &'static str = "MERKLE_AUTHSET_PARALLELIZATION_CUTOFF";
    const DEFAULT: usize = 512;
    const MINIMUM: usize = 2;

    /// The environment variable wins over `config_value`, which wins over the
    /// default. Never below the minimum.
    fn new(config_value: Option<usize>) -> Self {
        let cutoff = std::env::var(Self::ENV_VAR)
            .ok()
            .and_then(|s| s.parse().ok())
            .or(config_value)
            .unwrap_or(Self::DEFAULT)
            .max(Self::MINIMUM);

        Self(cutoff)
    }
}

/// Layers with at least `cutoff` parent nodes are hashed on the rayon thread
/// pool; narrower layers are hashed on the calling thread.
///
/// Defaults to 512 and is clamped to at least 2. Applies to the calling
/// thread only, and is ignored if `MERKLE_AUTHSET_PARALLELIZATION_CUTOFF` is
/// set.
pub fn set_materialize_parallelization_cutoff(cutoff: usize) {
    let cutoff = MaterializeParallelizationCutoff::new(Some(cutoff));
    CONFIG.with(|c| c.borrow_mut().materialize_parallelization_cutoff = cutoff);
}

pub(crate) fn materialize_parallelization_cutoff() -> usize {
    CONFIG
        .with(|c| c.borrow().materialize_parallelization_cutoff)
        .0
}
