use std::marker::PhantomData;

use collapse_rules::{AdjacencyMatrix, Mask, VariableId};

use crate::constrainer::Constrainer;
use crate::world::World;

/// A propagation rule table.
///
/// `apply` is invoked once for every cell popped from the propagation
/// queue, with the cell's collapsed value and variable index. Rules narrow
/// other cells through the constrainer; they never touch the world.
pub trait RuleSet<W: World, M: Mask> {
    fn apply(
        &self,
        world: &W,
        cell: usize,
        value: W::Value,
        id: VariableId,
        cons: &mut Constrainer<'_, '_, M>,
    );
}

/// Boxed per-value propagation callback.
pub type RuleFn<W, M> = Box<
    dyn Fn(&W, usize, <W as World>::Value, VariableId, &mut Constrainer<'_, '_, M>),
>;

/// Per-value callback table.
///
/// Each variable index can carry its own callback, a shared fallback covers
/// every index without one, and indices with neither are no-ops. Dispatch is
/// a single indexed load; no scanning over all `V` rules.
pub struct CallbackRules<W: World, M: Mask> {
    rules: Vec<Option<RuleFn<W, M>>>,
    fallback: Option<RuleFn<W, M>>,
}

impl<W: World, M: Mask> CallbackRules<W, M> {
    /// An empty table for `var_count` variables: every value is a no-op.
    pub fn new(var_count: usize) -> Self {
        let mut rules = Vec::with_capacity(var_count);
        rules.resize_with(var_count, || None);
        Self {
            rules,
            fallback: None,
        }
    }

    /// Install a callback for one variable index.
    pub fn constrain(
        mut self,
        id: VariableId,
        rule: impl Fn(&W, usize, W::Value, VariableId, &mut Constrainer<'_, '_, M>) + 'static,
    ) -> Self {
        self.rules[id.0] = Some(Box::new(rule));
        self
    }

    /// Install the shared fallback applied to every index without its own
    /// callback.
    pub fn constrain_all(
        mut self,
        rule: impl Fn(&W, usize, W::Value, VariableId, &mut Constrainer<'_, '_, M>) + 'static,
    ) -> Self {
        self.fallback = Some(Box::new(rule));
        self
    }

    pub fn var_count(&self) -> usize {
        self.rules.len()
    }
}

impl<W: World, M: Mask> RuleSet<W, M> for CallbackRules<W, M> {
    fn apply(
        &self,
        world: &W,
        cell: usize,
        value: W::Value,
        id: VariableId,
        cons: &mut Constrainer<'_, '_, M>,
    ) {
        debug_assert!(id.0 < self.rules.len(), "variable index out of range");
        if let Some(rule) = self.rules[id.0].as_ref().or(self.fallback.as_ref()) {
            rule(world, cell, value, id, cons);
        }
    }
}

/// Adjacency-matrix rule table.
///
/// For a collapsed cell holding variable `k`, each direction's neighbor has
/// its domain intersected with the matrix entry `(dir, k)`. The neighbor
/// function returns `None` when a direction has no neighbor; a neighbor id
/// equal to the source cell (a clamped edge) is applied like any other.
pub struct AdjacencyRules<W, M: Mask, F>
where
    F: Fn(&W, usize, usize) -> Option<usize>,
{
    matrix: AdjacencyMatrix<M>,
    neighbor: F,
    _world: PhantomData<fn(&W)>,
}

impl<W: World, M: Mask, F> AdjacencyRules<W, M, F>
where
    F: Fn(&W, usize, usize) -> Option<usize>,
{
    /// Bind a matrix to a neighbor lookup `(world, cell, dir) -> id`.
    pub fn new(matrix: AdjacencyMatrix<M>, neighbor: F) -> Self {
        Self {
            matrix,
            neighbor,
            _world: PhantomData,
        }
    }

    pub fn matrix(&self) -> &AdjacencyMatrix<M> {
        &self.matrix
    }
}

impl<W: World, M: Mask, F> RuleSet<W, M> for AdjacencyRules<W, M, F>
where
    F: Fn(&W, usize, usize) -> Option<usize>,
{
    fn apply(
        &self,
        world: &W,
        cell: usize,
        _value: W::Value,
        id: VariableId,
        cons: &mut Constrainer<'_, '_, M>,
    ) {
        for dir in 0..self.matrix.directions() {
            if let Some(neighbor) = (self.neighbor)(world, cell, dir) {
                cons.restrict(neighbor, self.matrix.mask(dir, id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::StackArena;
    use crate::queue::PropagationQueue;
    use crate::wave::Wave;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Line(Vec<u8>);

    impl World for Line {
        type Value = u8;

        fn size(&self) -> usize {
            self.0.len()
        }

        fn get_value(&self, cell: usize) -> u8 {
            self.0[cell]
        }

        fn set_value(&mut self, cell: usize, value: u8) {
            self.0[cell] = value;
        }
    }

    #[test]
    fn callback_dispatch_prefers_specific_rule() {
        let specific = Rc::new(Cell::new(0u32));
        let shared = Rc::new(Cell::new(0u32));
        let specific_count = Rc::clone(&specific);
        let shared_count = Rc::clone(&shared);

        let rules: CallbackRules<Line, u8> = CallbackRules::new(2)
            .constrain(VariableId(0), move |_, _, _, _, _| {
                specific_count.set(specific_count.get() + 1);
            })
            .constrain_all(move |_, _, _, _, _| {
                shared_count.set(shared_count.get() + 1);
            });

        let world = Line(vec![0, 0]);
        let arena = StackArena::new();
        let mut wave: Wave<'_, u8> = Wave::new_in(&arena, 2, 2);
        let mut queue = PropagationQueue::new(2);
        let mut cons = Constrainer::new(&mut wave, &mut queue);

        rules.apply(&world, 0, 1, VariableId(0), &mut cons);
        rules.apply(&world, 1, 2, VariableId(1), &mut cons);

        assert_eq!(specific.get(), 1);
        assert_eq!(shared.get(), 1);
    }

    #[test]
    fn missing_rule_is_a_noop() {
        let rules: CallbackRules<Line, u8> = CallbackRules::new(2);
        let world = Line(vec![0]);
        let arena = StackArena::new();
        let mut wave: Wave<'_, u8> = Wave::new_in(&arena, 1, 2);
        let mut queue = PropagationQueue::new(1);
        let mut cons = Constrainer::new(&mut wave, &mut queue);
        rules.apply(&world, 0, 1, VariableId(1), &mut cons);
        assert_eq!(wave.entropy(0), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn adjacency_rules_restrict_neighbors() {
        let mut matrix = AdjacencyMatrix::<u8>::new(1, 2);
        // Variable 0 only tolerates variable 1 to its right.
        matrix.allow(0, VariableId(0), VariableId(1));
        let rules = AdjacencyRules::new(matrix, |world: &Line, cell, _dir| {
            (cell + 1 < world.size()).then(|| cell + 1)
        });

        let world = Line(vec![0, 0]);
        let arena = StackArena::new();
        let mut wave: Wave<'_, u8> = Wave::new_in(&arena, 2, 2);
        let mut queue = PropagationQueue::new(2);
        wave.collapse(0, u8::bit(0));
        let mut cons = Constrainer::new(&mut wave, &mut queue);
        rules.apply(&world, 0, 7, VariableId(0), &mut cons);

        assert!(wave.is_collapsed(1));
        assert_eq!(wave.variable_id(1), VariableId(1));
        assert_eq!(queue.pop(), 1);
    }

    #[test]
    fn adjacency_rules_skip_missing_neighbors() {
        let mut matrix = AdjacencyMatrix::<u8>::new(1, 2);
        matrix.allow(0, VariableId(0), VariableId(1));
        let rules = AdjacencyRules::new(matrix, |world: &Line, cell, _dir| {
            (cell + 1 < world.size()).then(|| cell + 1)
        });

        let world = Line(vec![0, 0]);
        let arena = StackArena::new();
        let mut wave: Wave<'_, u8> = Wave::new_in(&arena, 2, 2);
        let mut queue = PropagationQueue::new(2);
        wave.collapse(1, u8::bit(0));
        let mut cons = Constrainer::new(&mut wave, &mut queue);
        // Last cell: no right neighbor, nothing changes.
        rules.apply(&world, 1, 7, VariableId(0), &mut cons);
        assert_eq!(wave.entropy(0), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn adjacency_rules_tolerate_self_loops() {
        let mut matrix = AdjacencyMatrix::<u8>::new(1, 2);
        matrix.allow(0, VariableId(0), VariableId(0));
        // Clamped edge: the neighbor lookup hands back the cell itself.
        let rules = AdjacencyRules::new(matrix, |_: &Line, cell, _dir| Some(cell));

        let world = Line(vec![0]);
        let arena = StackArena::new();
        let mut wave: Wave<'_, u8> = Wave::new_in(&arena, 1, 2);
        let mut queue = PropagationQueue::new(1);
        wave.collapse(0, u8::bit(0));
        let mut cons = Constrainer::new(&mut wave, &mut queue);
        rules.apply(&world, 0, 7, VariableId(0), &mut cons);

        // Already collapsed and still compatible: no change, no push.
        assert!(wave.is_collapsed(0));
        assert_eq!(wave.variable_id(0), VariableId(0));
        assert!(queue.is_empty());
    }
}
