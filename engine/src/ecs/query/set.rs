use crate::ecs::entity::Entity;

/// An owned snapshot of entities produced by a query.
///
/// Filters are pure subset operations: every entity they keep satisfies the predicate, and no
/// entity of the snapshot that satisfies it is dropped. The current filters happen to keep the
/// snapshot order, but callers should not rely on positions surviving a filter.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EntitySet {
    entities: Vec<Entity>,
}

impl EntitySet {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// A new set holding the entities that satisfy `predicate`. `self` is left untouched.
    pub fn filter(&self, mut predicate: impl FnMut(&Entity) -> bool) -> EntitySet {
        Self {
            entities: self.entities.iter().copied().filter(|e| predicate(e)).collect(),
        }
    }

    /// Like [`EntitySet::filter`], reusing this set's allocation.
    pub fn into_filter(mut self, predicate: impl FnMut(&Entity) -> bool) -> EntitySet {
        self.entities.retain(predicate);
        self
    }

    /// Drop every entity that does not satisfy `predicate`.
    pub fn filter_in_place(&mut self, predicate: impl FnMut(&Entity) -> bool) -> &mut Self {
        self.entities.retain(predicate);
        self
    }

    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }

    /// Linear membership test.
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }

    #[inline]
    pub fn into_vec(self) -> Vec<Entity> {
        self.entities
    }
}

impl From<Vec<Entity>> for EntitySet {
    #[inline]
    fn from(entities: Vec<Entity>) -> Self {
        Self { entities }
    }
}

impl FromIterator<Entity> for EntitySet {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        Self {
            entities: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for EntitySet {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}

impl<'a> IntoIterator for &'a EntitySet {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}
