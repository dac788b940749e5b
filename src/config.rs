// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Configuration parameters affecting the behaviour of this library.
//!

use dotenvy::var;
use std::sync::OnceLock;

/// Default cap placed on `limit(N)` pipeline stages that omit an explicit
/// bound elsewhere in the host application; the query language itself
/// requires `N > 0` but never caps it, so this only bounds our own
/// defensive batching chunk size, not a user-visible limit.
const DEFAULT_BATCH_CHUNK: usize = 500;

/// Default maximum levenshtein-suggestion list length attached to
/// "unknown name" validation errors.
const DEFAULT_SUGGESTION_LIMIT: usize = 3;

#[derive(Debug)]
pub(crate) struct Config {
    /// Number of outer-result ids grouped per `IN (...)` chunk when the
    /// store does not support one unbounded parameter list (kept small
    /// enough to stay under typical placeholder-count limits).
    batch_chunk_size: usize,
    /// How many suggestion names accompany an "unknown X" validation error.
    suggestion_limit: usize,
    /// Force the pipeline engine onto the N+1 path even when a stage is
    /// eligible for batching; used by `pipeline_equivalence` tests to
    /// compare both paths against the same data.
    force_n_plus_1: bool,
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// This library's configuration singleton.
pub(crate) fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

impl Config {
    fn from_env_impl() -> Self {
        let batch_chunk_size = var("VAULTQL_BATCH_CHUNK_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_BATCH_CHUNK);
        let suggestion_limit = var("VAULTQL_SUGGESTION_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SUGGESTION_LIMIT);
        let force_n_plus_1 = var("VAULTQL_FORCE_N_PLUS_1")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            batch_chunk_size,
            suggestion_limit,
            force_n_plus_1,
        }
    }
}

impl Config {
    fn from_env() -> Self {
        Self::from_env_impl()
    }

    /// Chunk size used when splitting a large outer-result id set across
    /// multiple batched aggregate queries.
    pub(crate) fn batch_chunk_size(&self) -> usize {
        self.batch_chunk_size
    }

    /// Suggestion list length for "unknown name" validation errors.
    pub(crate) fn suggestion_limit(&self) -> usize {
        self.suggestion_limit
    }

    /// Whether the pipeline engine should skip the batched path entirely.
    pub(crate) fn force_n_plus_1(&self) -> bool {
        self.force_n_plus_1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_env() {
        let cfg = Config::from_env_impl();
        assert!(cfg.batch_chunk_size() > 0);
        assert!(cfg.suggestion_limit() > 0);
    }
}
