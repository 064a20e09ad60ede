use fixedbitset::FixedBitSet;
use log::debug;

use super::{Entity, Generation, Id};

/// The existence table for every entity slot in a world.
///
/// Holds one live bit and one generation per slot. Allocation always takes the lowest free
/// slot so ids stay compact; when every slot is in use the table grows by `block_size` slots.
/// The table never shrinks except through [`Table::clear`].
#[derive(Debug)]
pub struct Table {
    live: FixedBitSet,
    generations: Vec<Generation>,
    block_size: usize,
    len: usize,
}

impl Table {
    /// Number of slots added each time the table runs out of free slots.
    pub const DEFAULT_BLOCK_SIZE: usize = 128;

    #[inline]
    pub fn new() -> Self {
        Self::with_block_size(Self::DEFAULT_BLOCK_SIZE)
    }

    /// # Panics
    ///
    /// Panics if `block_size` is 0.
    pub fn with_block_size(block_size: usize) -> Self {
        assert!(block_size > 0, "entity block size must be greater than 0");
        Self {
            live: FixedBitSet::new(),
            generations: Vec::new(),
            block_size,
            len: 0,
        }
    }

    /// Mark the lowest free slot live and return its entity.
    pub fn alloc(&mut self) -> Entity {
        let index = match self.live.zeroes().next() {
            Some(index) => index,
            None => self.grow(),
        };

        self.live.insert(index);
        self.len += 1;
        Entity::new_with_generation(Id(index as u32), self.generations[index])
    }

    /// Append a block of free slots, returning the first new slot.
    fn grow(&mut self) -> usize {
        let first = self.live.len();
        let capacity = first + self.block_size;
        self.live.grow(capacity);
        self.generations.resize(capacity, Generation::FIRST);
        debug!("entity table grew to {capacity} slots");
        first
    }

    /// Free a live entity's slot and bump its generation.
    ///
    /// Returns false, changing nothing, if `entity` is not alive.
    pub fn free(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }

        let index = entity.index();
        self.live.set(index, false);
        self.generations[index] = self.generations[index].next();
        self.len -= 1;
        true
    }

    /// Check that the entity's slot is live and its generation is current.
    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        let index = entity.index();
        self.live.contains(index) && self.generations[index] == entity.generation()
    }

    /// Number of live entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots, live or free.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.live.len()
    }

    /// Live entities in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.live
            .ones()
            .map(|index| Entity::new_with_generation(Id(index as u32), self.generations[index]))
    }

    /// Drop every slot, returning the table to its freshly constructed state.
    pub fn clear(&mut self) {
        self.live = FixedBitSet::new();
        self.generations.clear();
        self.len = 0;
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_is_sequential_from_zero() {
        // Given
        let mut table = Table::new();

        // When
        let entities: Vec<_> = (0..5).map(|_| table.alloc()).collect();

        // Then
        for (i, entity) in entities.iter().enumerate() {
            assert_eq!(entity.index(), i);
            assert_eq!(entity.generation(), Generation::FIRST);
        }
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn grows_by_whole_blocks() {
        // Given
        let mut table = Table::with_block_size(4);
        assert_eq!(table.capacity(), 0);

        // When
        for _ in 0..4 {
            table.alloc();
        }

        // Then
        assert_eq!(table.capacity(), 4);

        // When - one past the block
        let fifth = table.alloc();

        // Then
        assert_eq!(fifth.index(), 4);
        assert_eq!(table.capacity(), 8);
    }

    #[test]
    fn reuses_lowest_free_slot() {
        // Given
        let mut table = Table::with_block_size(8);
        let entities: Vec<_> = (0..6).map(|_| table.alloc()).collect();

        // When
        assert!(table.free(entities[4]));
        assert!(table.free(entities[1]));
        let first = table.alloc();
        let second = table.alloc();
        let third = table.alloc();

        // Then
        assert_eq!(first.index(), 1);
        assert_eq!(first.generation().value(), 1);
        assert_eq!(second.index(), 4);
        assert_eq!(third.index(), 6);
        assert_eq!(third.generation().value(), 0);
    }

    #[test]
    fn stale_handles_are_rejected() {
        // Given
        let mut table = Table::new();
        let entity = table.alloc();

        // When
        assert!(table.free(entity));
        let reused = table.alloc();

        // Then
        assert_eq!(reused.id(), entity.id());
        assert!(table.is_alive(reused));
        assert!(!table.is_alive(entity));
        assert!(!table.free(entity));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn iter_yields_live_entities_in_order() {
        let mut table = Table::with_block_size(2);
        let entities: Vec<_> = (0..5).map(|_| table.alloc()).collect();
        table.free(entities[0]);
        table.free(entities[3]);

        let live: Vec<_> = table.iter().collect();

        assert_eq!(live, vec![entities[1], entities[2], entities[4]]);
    }

    #[test]
    fn clear_resets_everything() {
        let mut table = Table::with_block_size(2);
        for _ in 0..3 {
            table.alloc();
        }

        table.clear();

        assert!(table.is_empty());
        assert_eq!(table.capacity(), 0);
        assert_eq!(table.alloc(), Entity::new(0));
    }

    #[test]
    #[should_panic(expected = "block size")]
    fn zero_block_size_panics() {
        let _ = Table::with_block_size(0);
    }
}
