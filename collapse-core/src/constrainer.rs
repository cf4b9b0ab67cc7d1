use collapse_rules::{Mask, VariableId};

use crate::queue::PropagationQueue;
use crate::wave::Wave;

/// The only mutation surface rule functions see.
///
/// Wraps the wave and the propagation queue and runs the observed-transition
/// protocol around every edit: when a cell goes from undecided to collapsed
/// it is queued for propagation. Transitions to an empty domain are not
/// queued; the solver loop detects contradictions after the queue drains.
pub struct Constrainer<'a, 'w, M: Mask> {
    wave: &'a mut Wave<'w, M>,
    queue: &'a mut PropagationQueue,
}

impl<'a, 'w, M: Mask> Constrainer<'a, 'w, M> {
    pub(crate) fn new(wave: &'a mut Wave<'w, M>, queue: &'a mut PropagationQueue) -> Self {
        Self { wave, queue }
    }

    /// Remove the listed values from a cell's domain.
    pub fn exclude(&mut self, cell: usize, ids: &[VariableId]) {
        self.apply(cell, !M::from_indices(ids));
    }

    /// Restrict a cell's domain to the listed values.
    pub fn only(&mut self, cell: usize, ids: &[VariableId]) {
        self.apply(cell, M::from_indices(ids));
    }

    /// Intersect a cell's domain with an arbitrary mask (the
    /// adjacency-matrix path).
    pub fn restrict(&mut self, cell: usize, mask: M) {
        self.apply(cell, mask);
    }

    /// Re-admit values into an undecided cell.
    ///
    /// A no-op on collapsed cells: a decided cell can never be un-decided.
    /// Rules that first exclude broadly and then re-include around specific
    /// cells rely on this ordering being safe.
    pub fn include(&mut self, cell: usize, ids: &[VariableId]) {
        if self.wave.is_collapsed(cell) {
            return;
        }
        self.wave.enable(cell, M::from_indices(ids));
    }

    pub fn entropy(&self, cell: usize) -> usize {
        self.wave.entropy(cell)
    }

    pub fn is_collapsed(&self, cell: usize) -> bool {
        self.wave.is_collapsed(cell)
    }

    fn apply(&mut self, cell: usize, mask: M) {
        let was_collapsed = self.wave.is_collapsed(cell);
        self.wave.collapse(cell, mask);
        if !was_collapsed && self.wave.is_collapsed(cell) {
            self.queue.push(cell);
        }
    }
}
