/// 256-bit membership filter over token bloom bits.
///
/// A set bit means "possibly present"; an unset bit means "definitely absent".
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct BloomFilter([u32; 8]);

impl BloomFilter {
    pub const EMPTY: BloomFilter = BloomFilter([0; 8]);

    #[inline]
    pub fn insert(&mut self, bit: u8) {
        self.0[(bit >> 5) as usize] |= 1 << (bit & 31);
    }

    #[inline]
    pub fn contains(&self, bit: u8) -> bool {
        self.0[(bit >> 5) as usize] & (1 << (bit & 31)) != 0
    }

    #[inline]
    pub fn union(self, other: BloomFilter) -> BloomFilter {
        let mut words = self.0;
        for (word, extra) in words.iter_mut().zip(other.0) {
            *word |= extra;
        }
        BloomFilter(words)
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|word| *word == 0)
    }

    pub fn words(&self) -> &[u32; 8] {
        &self.0
    }
}

/// Bloom overlay attached to an element: the tokens registered on the element
/// itself and the tokens registered on it or any ancestor element, across view
/// boundaries.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct NodeBloom {
    pub own: BloomFilter,
    pub cumulative: BloomFilter,
}

impl NodeBloom {
    pub fn new(own: BloomFilter, parent: Option<&NodeBloom>) -> Self {
        let cumulative = match parent {
            Some(parent) => own.union(parent.cumulative),
            None => own,
        };
        Self { own, cumulative }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_land_in_the_right_word() {
        let mut filter = BloomFilter::default();
        filter.insert(0);
        filter.insert(33);
        filter.insert(255);
        assert!(filter.contains(0));
        assert!(filter.contains(33));
        assert!(filter.contains(255));
        assert!(!filter.contains(1));
        assert!(!filter.contains(32));
        assert_eq!(filter.words()[1], 0b10);
        assert_eq!(filter.words()[7], 1 << 31);
    }

    #[test]
    fn cumulative_includes_parent_chain() {
        let mut root = BloomFilter::default();
        root.insert(3);
        let root = NodeBloom::new(root, None);
        let mut own = BloomFilter::default();
        own.insert(9);
        let child = NodeBloom::new(own, Some(&root));
        assert!(child.own.contains(9));
        assert!(!child.own.contains(3));
        assert!(child.cumulative.contains(3));
        assert!(child.cumulative.contains(9));
    }
}
