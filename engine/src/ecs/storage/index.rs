use crate::ecs::{entity::Entity, storage::row::Row};

/// A block-based sparse index from entity slots to dense storage rows.
///
/// The entity id space is divided into fixed-size blocks, and memory is only allocated for
/// blocks that hold at least one entry. Within a block a dense vector stores the rows, giving
/// O(1) lookup with good cache locality.
///
/// Entity ids are allocated lowest-free-first, so they cluster near zero and rarely leave
/// gaps. That makes the blocks dense in practice, while a component carried by a handful of
/// high-id entities only pays for the blocks those ids land in.
///
/// | Operation | Time | Memory |
/// |-----------|------|--------|
/// | `insert()` | O(1) amortized | Allocates block on first use |
/// | `get()` | O(1) | No allocation |
/// | `remove()` | O(1) | No deallocation (leaves `None`) |
///
/// The index is keyed by entity id only. Owners (and their generations) are checked by the
/// storage that uses the index.
#[derive(Debug)]
pub struct DynamicIndex {
    /// The size of blocks to allocate when growing the index.
    block_size: usize,

    /// Outer Vec is indexed by `id / block_size`, inner Vec by `id % block_size`.
    blocks: Vec<Option<Vec<Option<Row>>>>,
}

impl DynamicIndex {
    pub const DEFAULT_BLOCK_SIZE: usize = 256;

    #[inline]
    pub const fn new() -> Self {
        Self::new_with_block_size(Self::DEFAULT_BLOCK_SIZE)
    }

    /// # Panics
    ///
    /// Debug builds panic if block_size is 0.
    #[inline]
    pub const fn new_with_block_size(block_size: usize) -> Self {
        debug_assert!(block_size > 0, "block_size must be greater than 0");
        Self {
            block_size,
            blocks: Vec::new(),
        }
    }

    #[inline]
    fn indices(&self, entity: Entity) -> (usize, usize) {
        let index = entity.index();
        (index / self.block_size, index % self.block_size)
    }

    /// Map the entity's slot to `row`, replacing any previous row.
    pub fn insert(&mut self, entity: Entity, row: Row) {
        let (block_index, slot) = self.indices(entity);

        if block_index >= self.blocks.len() {
            self.blocks.resize_with(block_index + 1, || None);
        }

        let block_size = self.block_size;
        let block = self.blocks[block_index].get_or_insert_with(|| vec![None; block_size]);
        block[slot] = Some(row);
    }

    /// Get the row mapped to the entity's slot.
    #[inline]
    pub fn get(&self, entity: Entity) -> Option<Row> {
        let (block_index, slot) = self.indices(entity);
        let block = self.blocks.get(block_index)?.as_ref()?;
        block[slot]
    }

    /// Unmap the entity's slot, returning the row it pointed at.
    pub fn remove(&mut self, entity: Entity) -> Option<Row> {
        let (block_index, slot) = self.indices(entity);
        let block = self.blocks.get_mut(block_index)?.as_mut()?;
        block[slot].take()
    }

    /// Number of block slots, allocated or not.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn allocated_block_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_some()).count()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }
}

impl Default for DynamicIndex {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: u32) -> Entity {
        Entity::new(id)
    }

    fn row(index: usize) -> Option<Row> {
        Some(Row::new(index))
    }

    #[test]
    fn single_block() {
        // Given
        let mut index = DynamicIndex::new_with_block_size(10);

        // When
        index.insert(entity(0), 10.into());
        index.insert(entity(5), 40.into());
        index.insert(entity(9), 80.into());

        // Then
        assert_eq!(index.block_count(), 1);
        assert_eq!(index.get(entity(0)), row(10));
        assert_eq!(index.get(entity(1)), None);
        assert_eq!(index.get(entity(5)), row(40));
        assert_eq!(index.get(entity(9)), row(80));
        assert_eq!(index.get(entity(10)), None);
    }

    #[test]
    fn skips_unused_blocks() {
        // Given
        let mut index = DynamicIndex::new_with_block_size(4);

        // When
        index.insert(entity(0), 10.into());
        index.insert(entity(9), 80.into());

        // Then - three block slots with the middle one never allocated
        assert_eq!(index.block_count(), 3);
        assert_eq!(index.allocated_block_count(), 2);
        assert_eq!(index.blocks[1], None);
        assert_eq!(index.get(entity(5)), None);
    }

    #[test]
    fn insert_replaces_and_remove_takes() {
        // Given
        let mut index = DynamicIndex::new();
        index.insert(entity(3), 1.into());

        // When
        index.insert(entity(3), 2.into());

        // Then
        assert_eq!(index.get(entity(3)), row(2));
        assert_eq!(index.remove(entity(3)), row(2));
        assert_eq!(index.remove(entity(3)), None);
        assert_eq!(index.remove(entity(900)), None);
    }
}
