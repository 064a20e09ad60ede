/// Position of a component in its storage's dense value and owner vecs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Row(usize);

impl Row {
    #[inline]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl From<usize> for Row {
    #[inline]
    fn from(index: usize) -> Self {
        Self(index)
    }
}
