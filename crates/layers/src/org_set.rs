use std::ops::{BitAndAssign, BitOrAssign};

const BLOCK_BITS: u32 = u64::BITS;

/// Organizations of one [`EntityIndex`](crate::index::EntityIndex), by ordinal.
///
/// Ordinals follow sorted organization id order, so iteration is ascending.
/// Trailing empty blocks are never stored; two sets holding the same
/// organizations compare equal whatever produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgSet {
    blocks: Vec<u64>,
}

impl OrgSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every organization of an index holding `count` of them.
    pub fn full(count: u32) -> Self {
        let mut blocks = vec![u64::MAX; (count / BLOCK_BITS) as usize];
        let rest = count % BLOCK_BITS;
        if rest > 0 {
            blocks.push((1u64 << rest) - 1);
        }
        Self { blocks }
    }

    pub fn len(&self) -> usize {
        self.blocks.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, ordinal: u32) -> bool {
        let (block, mask) = locate(ordinal);
        self.blocks.get(block).is_some_and(|b| b & mask != 0)
    }

    /// Returns `false` if the organization was already present.
    pub fn insert(&mut self, ordinal: u32) -> bool {
        let (block, mask) = locate(ordinal);
        if self.blocks.len() <= block {
            self.blocks.resize(block + 1, 0);
        }
        let was_present = self.blocks[block] & mask != 0;
        self.blocks[block] |= mask;
        !was_present
    }

    /// `true` if some organization is in both sets.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.blocks
            .iter()
            .zip(&other.blocks)
            .any(|(a, b)| a & b != 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.blocks.iter().enumerate().flat_map(|(i, &block)| {
            let base = i as u32 * BLOCK_BITS;
            (0..BLOCK_BITS)
                .filter(move |bit| block & (1u64 << bit) != 0)
                .map(move |bit| base + bit)
        })
    }

    fn trim(&mut self) {
        while self.blocks.last() == Some(&0) {
            self.blocks.pop();
        }
    }
}

fn locate(ordinal: u32) -> (usize, u64) {
    ((ordinal / BLOCK_BITS) as usize, 1u64 << (ordinal % BLOCK_BITS))
}

impl BitOrAssign<&OrgSet> for OrgSet {
    fn bitor_assign(&mut self, other: &OrgSet) {
        if self.blocks.len() < other.blocks.len() {
            self.blocks.resize(other.blocks.len(), 0);
        }
        for (mine, theirs) in self.blocks.iter_mut().zip(&other.blocks) {
            *mine |= theirs;
        }
    }
}

impl BitAndAssign<&OrgSet> for OrgSet {
    fn bitand_assign(&mut self, other: &OrgSet) {
        self.blocks.truncate(other.blocks.len());
        for (mine, theirs) in self.blocks.iter_mut().zip(&other.blocks) {
            *mine &= theirs;
        }
        self.trim();
    }
}

impl FromIterator<u32> for OrgSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = Self::new();
        for ordinal in iter {
            set.insert(ordinal);
        }
        set
    }
}
