/// Boolean exclusion mask aligned with the positions of a
/// [`SpatialIndex`](crate::SpatialIndex). `true` means excluded.
///
/// The caller owns the buffer. Searches only ever set bits; they never clear
/// or resize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    bits: Vec<bool>,
}

impl Mask {
    /// A mask of `len` positions, all set to `masked`.
    pub fn new(len: usize, masked: bool) -> Self {
        Self {
            bits: vec![masked; len],
        }
    }

    /// A mask of `len` positions with nothing excluded.
    pub fn clear(len: usize) -> Self {
        Self::new(len, false)
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    #[inline]
    pub fn is_masked(&self, index: usize) -> bool {
        self.bits[index]
    }

    /// Exclude position `index`.
    #[inline]
    pub fn mark(&mut self, index: usize) {
        self.bits[index] = true;
    }

    /// Re-admit position `index`.
    #[inline]
    pub fn unmark(&mut self, index: usize) {
        self.bits[index] = false;
    }

    /// Number of excluded positions.
    pub fn count_masked(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Positions that are not excluded, ascending.
    pub fn unmasked_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, &b)| !b)
            .map(|(i, _)| i)
    }

    /// Positions that are excluded, ascending.
    pub fn masked_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, &b)| b)
            .map(|(i, _)| i)
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }
}

impl From<Vec<bool>> for Mask {
    fn from(bits: Vec<bool>) -> Self {
        Self { bits }
    }
}

impl std::ops::Index<usize> for Mask {
    type Output = bool;

    fn index(&self, index: usize) -> &bool {
        &self.bits[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_and_count() {
        let mut m = Mask::clear(5);
        m.mark(1);
        m.mark(3);
        m.mark(3);
        assert_eq!(m.count_masked(), 2);
        assert!(m[1] && m.is_masked(3) && !m[0]);
        assert_eq!(m.unmasked_indices().collect::<Vec<_>>(), vec![0, 2, 4]);
        assert_eq!(m.masked_indices().collect::<Vec<_>>(), vec![1, 3]);

        m.unmark(1);
        assert_eq!(m.count_masked(), 1);
    }
}
