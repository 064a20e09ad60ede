use std::num::NonZeroUsize;
use std::thread;

use crate::ecs::entity::Table;

/// Configuration for a [`World`](super::World).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of worker threads systems are executed on.
    pub worker_threads: usize,
    /// Number of entity slots added each time the entity table is full.
    pub entity_block_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_threads: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            entity_block_size: Table::DEFAULT_BLOCK_SIZE,
        }
    }
}

impl Config {
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    pub fn with_entity_block_size(mut self, entity_block_size: usize) -> Self {
        self.entity_block_size = entity_block_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();

        assert!(config.worker_threads >= 1);
        assert_eq!(config.entity_block_size, 128);
    }

    #[test]
    fn builder_overrides() {
        let config = Config::default()
            .with_worker_threads(2)
            .with_entity_block_size(16);

        assert_eq!(
            config,
            Config {
                worker_threads: 2,
                entity_block_size: 16
            }
        );
    }
}
