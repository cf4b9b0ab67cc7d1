use collapse_rules::{Mask, VariableId};

use crate::arena::StackArena;

/// The possibility state of the whole problem: one bit domain per cell.
///
/// Waves live in arena memory so that branch clones are released wholesale
/// when the branch frame rewinds. Copying a wave is a memcpy of the domain
/// slice. A wave must not be used after the arena position it was allocated
/// at has been rewound past; the solver's branch bodies uphold this by
/// dropping the clone before the frame guard.
pub struct Wave<'a, M: Mask> {
    cells: &'a mut [M],
    vars: usize,
}

impl<'a, M: Mask> Wave<'a, M> {
    /// A wave of `len` cells, each starting with all `vars` values possible.
    pub fn new_in(arena: &'a StackArena, len: usize, vars: usize) -> Self {
        assert!(
            vars > 0 && vars <= M::BITS,
            "variable count must fit the mask type"
        );
        Self {
            cells: arena.alloc_slice_filled(len, M::full(vars)),
            vars,
        }
    }

    /// Copy this wave into fresh arena storage: the per-branch clone.
    pub fn clone_in(&self, arena: &'a StackArena) -> Self {
        Wave {
            cells: arena.alloc_slice_copied(self.cells),
            vars: self.vars,
        }
    }

    /// Overwrite this wave with `other`'s domains (branch success path).
    pub fn copy_from(&mut self, other: &Wave<'_, M>) {
        self.cells.copy_from_slice(other.cells);
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn var_count(&self) -> usize {
        self.vars
    }

    /// Intersect the cell's domain with `mask`.
    #[inline]
    pub fn collapse(&mut self, cell: usize, mask: M) {
        self.cells[cell] = self.cells[cell] & mask;
    }

    /// Union the cell's domain with `mask`. The mask must not name bits at
    /// or above the variable count.
    #[inline]
    pub fn enable(&mut self, cell: usize, mask: M) {
        debug_assert!(
            (mask & !M::full(self.vars)).is_zero(),
            "enable mask reaches past the variable count"
        );
        self.cells[cell] = self.cells[cell] | mask;
    }

    #[inline]
    pub fn entropy(&self, cell: usize) -> usize {
        self.cells[cell].count_ones()
    }

    #[inline]
    pub fn is_collapsed(&self, cell: usize) -> bool {
        self.entropy(cell) == 1
    }

    #[inline]
    pub fn is_contradicted(&self, cell: usize) -> bool {
        self.cells[cell].is_zero()
    }

    pub fn is_fully_collapsed(&self) -> bool {
        self.cells.iter().all(|mask| mask.count_ones() == 1)
    }

    pub fn has_contradiction(&self) -> bool {
        self.cells.iter().any(|mask| mask.is_zero())
    }

    /// Variable index of the cell's lowest remaining candidate. Only
    /// meaningful for the assignment once the cell is collapsed.
    #[inline]
    pub fn variable_id(&self, cell: usize) -> VariableId {
        debug_assert!(!self.is_contradicted(cell), "cell has an empty domain");
        VariableId(self.cells[cell].trailing_zeros())
    }

    /// The raw domain mask.
    #[inline]
    pub fn mask(&self, cell: usize) -> M {
        self.cells[cell]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_full_everywhere() {
        let arena = StackArena::new();
        let wave: Wave<'_, u8> = Wave::new_in(&arena, 4, 3);
        assert_eq!(wave.len(), 4);
        for cell in 0..4 {
            assert_eq!(wave.entropy(cell), 3);
            assert_eq!(wave.mask(cell), 0b111);
            assert!(!wave.is_collapsed(cell));
        }
        assert!(!wave.is_fully_collapsed());
        assert!(!wave.has_contradiction());
    }

    #[test]
    fn collapse_and_enable_edit_domains() {
        let arena = StackArena::new();
        let mut wave: Wave<'_, u8> = Wave::new_in(&arena, 2, 3);

        wave.collapse(0, u8::bit(1));
        assert!(wave.is_collapsed(0));
        assert_eq!(wave.variable_id(0), VariableId(1));

        wave.collapse(1, <u8 as Mask>::ZERO);
        assert!(wave.is_contradicted(1));
        assert!(wave.has_contradiction());

        wave.enable(1, u8::bit(2));
        assert_eq!(wave.entropy(1), 1);
        assert_eq!(wave.variable_id(1), VariableId(2));
    }

    #[test]
    fn fully_collapsed_needs_every_cell() {
        let arena = StackArena::new();
        let mut wave: Wave<'_, u8> = Wave::new_in(&arena, 2, 2);
        wave.collapse(0, u8::bit(0));
        assert!(!wave.is_fully_collapsed());
        wave.collapse(1, u8::bit(1));
        assert!(wave.is_fully_collapsed());
    }

    #[test]
    fn clone_is_independent_of_parent() {
        let arena = StackArena::new();
        let mut parent: Wave<'_, u8> = Wave::new_in(&arena, 3, 2);
        parent.collapse(0, u8::bit(0));

        let mut clone = parent.clone_in(&arena);
        clone.collapse(1, u8::bit(1));
        clone.collapse(2, u8::bit(1));

        // Parent never saw the clone's edits.
        assert_eq!(parent.entropy(1), 2);
        assert_eq!(parent.entropy(2), 2);
        assert!(clone.is_fully_collapsed());

        parent.copy_from(&clone);
        assert!(parent.is_fully_collapsed());
        assert_eq!(parent.variable_id(1), VariableId(1));
    }

    #[test]
    fn branch_clone_releases_with_the_frame() {
        let arena = StackArena::new();
        let parent: Wave<'_, u8> = Wave::new_in(&arena, 8, 2);
        let before = arena.mark();
        {
            let _frame = arena.frame();
            let clone = parent.clone_in(&arena);
            assert_eq!(clone.len(), 8);
            assert_ne!(arena.mark(), before);
        }
        assert_eq!(arena.mark(), before);
    }

    #[test]
    fn wide_mask_wave() {
        let arena = StackArena::new();
        let mut wave: Wave<'_, collapse_rules::WideMask<2>> = Wave::new_in(&arena, 2, 100);
        assert_eq!(wave.entropy(0), 100);
        wave.collapse(0, collapse_rules::WideMask::<2>::bit(97));
        assert!(wave.is_collapsed(0));
        assert_eq!(wave.variable_id(0), VariableId(97));
    }
}
