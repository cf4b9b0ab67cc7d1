use log::{debug, trace, warn};

use collapse_rules::{Mask, VariableId, VariableMap};

use crate::arena::StackArena;
use crate::constrainer::Constrainer;
use crate::queue::PropagationQueue;
use crate::rules::RuleSet;
use crate::select::ValueSelector;
use crate::wave::Wave;
use crate::world::World;
use crate::WfcError;

/// Iteration bound used when the configuration does not override it.
pub const DEFAULT_MAX_ITERATIONS: u64 = 16 * 1024;

/// Event hook; receives the world refreshed from the current wave.
pub type EventHook<W> = Box<dyn Fn(&W)>;

/// Rule run once before the main loop, after seeding from the world. It may
/// constrain or force cells through the constrainer and may consult the
/// selector for randomised setups.
pub type InitialRule<W, M> =
    Box<dyn Fn(&W, &mut Constrainer<'_, '_, M>, &mut dyn ValueSelector)>;

/// Configuration for a solve: iteration bound, optional initial-state rule
/// and optional event hooks.
pub struct WfcConfig<W: World, M: Mask> {
    pub max_iterations: u64,
    pub initial_rule: Option<InitialRule<W, M>>,
    pub on_cell_collapsed: Option<EventHook<W>>,
    pub on_contradiction: Option<EventHook<W>>,
    pub on_branch: Option<EventHook<W>>,
}

impl<W: World, M: Mask> WfcConfig<W, M> {
    /// Creates a new builder for `WfcConfig`.
    pub fn builder() -> WfcConfigBuilder<W, M> {
        WfcConfigBuilder::default()
    }
}

impl<W: World, M: Mask> Default for WfcConfig<W, M> {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            initial_rule: None,
            on_cell_collapsed: None,
            on_contradiction: None,
            on_branch: None,
        }
    }
}

/// Builder for [`WfcConfig`].
pub struct WfcConfigBuilder<W: World, M: Mask> {
    max_iterations: u64,
    initial_rule: Option<InitialRule<W, M>>,
    on_cell_collapsed: Option<EventHook<W>>,
    on_contradiction: Option<EventHook<W>>,
    on_branch: Option<EventHook<W>>,
}

impl<W: World, M: Mask> Default for WfcConfigBuilder<W, M> {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            initial_rule: None,
            on_cell_collapsed: None,
            on_contradiction: None,
            on_branch: None,
        }
    }
}

impl<W: World, M: Mask> WfcConfigBuilder<W, M> {
    /// Caps the total number of solver iterations (propagation/branch
    /// rounds across all recursion depths).
    pub fn max_iterations(mut self, max: u64) -> Self {
        self.max_iterations = max;
        self
    }

    /// Sets the rule applied once before the main loop.
    pub fn initial_rule(
        mut self,
        rule: impl Fn(&W, &mut Constrainer<'_, '_, M>, &mut dyn ValueSelector) + 'static,
    ) -> Self {
        self.initial_rule = Some(Box::new(rule));
        self
    }

    /// Fires after a cell is explicitly collapsed (seeding and branching).
    pub fn on_cell_collapsed(mut self, hook: impl Fn(&W) + 'static) -> Self {
        self.on_cell_collapsed = Some(Box::new(hook));
        self
    }

    /// Fires when propagation leaves some cell with an empty domain.
    pub fn on_contradiction(mut self, hook: impl Fn(&W) + 'static) -> Self {
        self.on_contradiction = Some(Box::new(hook));
        self
    }

    /// Fires right before the solver observes a cell and branches.
    pub fn on_branch(mut self, hook: impl Fn(&W) + 'static) -> Self {
        self.on_branch = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> WfcConfig<W, M> {
        WfcConfig {
            max_iterations: self.max_iterations,
            initial_rule: self.initial_rule,
            on_cell_collapsed: self.on_cell_collapsed,
            on_contradiction: self.on_contradiction,
            on_branch: self.on_branch,
        }
    }
}

// Per-run mutable state threaded through the recursion. The arena is kept
// outside so wave clones can borrow it independently of this struct.
struct SolverState<'r, W, S> {
    world: &'r mut W,
    queue: PropagationQueue,
    selector: S,
    iterations: u64,
}

/// Executes the solver against `world`.
///
/// Builds a fully-open wave, seeds it from any cells whose current world
/// value is mapped, applies the configured initial-state rule, then
/// alternates constraint propagation with minimum-entropy branching until
/// the wave is fully collapsed or shown unsatisfiable.
///
/// On success every cell's value is written back into `world`. On failure
/// the world's contents are unspecified (event hooks may have refreshed it
/// with partial assignments).
pub fn run<W, VM, M, R, S>(
    world: &mut W,
    map: &VM,
    rules: &R,
    selector: S,
    config: &WfcConfig<W, M>,
) -> Result<(), WfcError>
where
    W: World,
    VM: VariableMap<Value = W::Value>,
    M: Mask,
    R: RuleSet<W, M>,
    S: ValueSelector,
{
    assert!(!map.is_empty(), "variable map is empty");
    assert!(
        map.len() <= M::BITS,
        "mask type too narrow for {} variables",
        map.len()
    );

    let size = world.size();
    debug!("starting solve: {size} cells, {} variables", map.len());

    let arena = StackArena::new();
    let mut state = SolverState {
        world,
        queue: PropagationQueue::new(size),
        selector,
        iterations: 0,
    };
    let mut wave: Wave<'_, M> = Wave::new_in(&arena, size, map.len());

    seed_from_world(&mut state, map, config, &mut wave);

    if let Some(initial) = config.initial_rule.as_ref() {
        let mut cons = Constrainer::new(&mut wave, &mut state.queue);
        initial(state.world, &mut cons, &mut state.selector);
    }

    solve_step(&mut state, &arena, map, rules, config, &mut wave)?;

    refresh_world(state.world, map, &wave);
    debug!("solve finished after {} iterations", state.iterations);
    Ok(())
}

/// Collapses every cell whose world value is already one of the mapped
/// values, queueing it for propagation.
fn seed_from_world<W, VM, M, S>(
    state: &mut SolverState<'_, W, S>,
    map: &VM,
    config: &WfcConfig<W, M>,
    wave: &mut Wave<'_, M>,
) where
    W: World,
    VM: VariableMap<Value = W::Value>,
    M: Mask,
    S: ValueSelector,
{
    for cell in 0..wave.len() {
        let value = state.world.get_value(cell);
        if let Some(id) = map.index_of(&value) {
            collapse_cell(state, map, config, wave, cell, id);
            state.queue.push(cell);
        }
    }
}

/// One round of the solver: propagate, check, branch. Branching recurses
/// back into this function; the iteration counter is shared across all
/// recursion depths and bounds the total work.
fn solve_step<'w, W, VM, M, R, S>(
    state: &mut SolverState<'_, W, S>,
    arena: &'w StackArena,
    map: &VM,
    rules: &R,
    config: &WfcConfig<W, M>,
    wave: &mut Wave<'w, M>,
) -> Result<(), WfcError>
where
    W: World,
    VM: VariableMap<Value = W::Value>,
    M: Mask,
    R: RuleSet<W, M>,
    S: ValueSelector,
{
    if state.iterations >= config.max_iterations {
        warn!("iteration limit {} reached, giving up", config.max_iterations);
        return Err(WfcError::IterationLimit(config.max_iterations));
    }
    state.iterations += 1;

    propagate(state, map, rules, wave)?;

    if wave.has_contradiction() {
        if let Some(hook) = config.on_contradiction.as_ref() {
            refresh_world(state.world, map, wave);
            hook(state.world);
        }
        let cell = first_contradicted(wave);
        trace!("contradiction at cell {cell}");
        return Err(WfcError::Contradiction(cell));
    }

    if wave.is_fully_collapsed() {
        return Ok(());
    }

    if let Some(hook) = config.on_branch.as_ref() {
        refresh_world(state.world, map, wave);
        hook(state.world);
    }

    branch(state, arena, map, rules, config, wave)
}

/// Drains the queue, applying the rule for each popped cell's variable.
fn propagate<W, VM, M, R, S>(
    state: &mut SolverState<'_, W, S>,
    map: &VM,
    rules: &R,
    wave: &mut Wave<'_, M>,
) -> Result<(), WfcError>
where
    W: World,
    VM: VariableMap<Value = W::Value>,
    M: Mask,
    R: RuleSet<W, M>,
    S: ValueSelector,
{
    while !state.queue.is_empty() {
        let cell = state.queue.pop();
        if wave.is_contradicted(cell) {
            trace!("cell {cell} contradicted while queued");
            return Err(WfcError::Contradiction(cell));
        }
        debug_assert!(wave.is_collapsed(cell), "queued cell must be collapsed");

        let id = wave.variable_id(cell);
        let value = map.value_of(id);
        let mut cons = Constrainer::new(wave, &mut state.queue);
        rules.apply(state.world, cell, value, id, &mut cons);
    }
    Ok(())
}

/// Observes the cell of minimum entropy > 1 and tries its candidate values
/// one by one, each inside an arena frame and queue checkpoint. A failed
/// candidate is removed from the parent wave before the next attempt so the
/// parent reflects everything learned below it.
fn branch<'w, W, VM, M, R, S>(
    state: &mut SolverState<'_, W, S>,
    arena: &'w StackArena,
    map: &VM,
    rules: &R,
    config: &WfcConfig<W, M>,
    wave: &mut Wave<'w, M>,
) -> Result<(), WfcError>
where
    W: World,
    VM: VariableMap<Value = W::Value>,
    M: Mask,
    R: RuleSet<W, M>,
    S: ValueSelector,
{
    debug_assert!(state.queue.is_empty(), "branching with a non-empty queue");

    // Minimum entropy strictly above 1; lowest cell id wins ties.
    let mut chosen = None;
    let mut min_entropy = usize::MAX;
    for cell in 0..wave.len() {
        let entropy = wave.entropy(cell);
        if entropy > 1 && entropy < min_entropy {
            min_entropy = entropy;
            chosen = Some(cell);
        }
    }
    let Some(cell) = chosen else {
        // Coexists with a fully collapsed wave; the caller checks that first.
        return Err(WfcError::Exhausted);
    };

    trace!("branching on cell {cell} (entropy {min_entropy})");

    // Candidate variable indices, lowest bit first. Lives in the enclosing
    // frame so per-attempt rewinds below leave it alone.
    let candidates = arena.alloc_slice_filled(min_entropy, VariableId(0));
    let mut mask = wave.mask(cell);
    for slot in candidates.iter_mut() {
        let index = mask.trailing_zeros();
        debug_assert!(index < map.len(), "candidate index out of range");
        *slot = VariableId(index);
        mask = mask & !M::bit(index);
    }
    debug_assert!(mask.is_zero());

    let mut remaining = min_entropy;
    while remaining > 0 {
        let pick = state.selector.pick(remaining);
        let id = candidates[pick];

        let outcome = {
            let _frame = arena.frame();
            let queue_mark = state.queue.mark();

            let mut attempt = wave.clone_in(arena);
            collapse_cell(state, map, config, &mut attempt, cell, id);
            state.queue.push(cell);

            let result = solve_step(state, arena, map, rules, config, &mut attempt);
            if result.is_ok() {
                wave.copy_from(&attempt);
            }
            state.queue.rewind(queue_mark);
            result
            // The frame guard drops here, releasing the attempt's wave.
        };

        match outcome {
            Ok(()) => return Ok(()),
            // The bound is global; retrying siblings cannot help.
            Err(WfcError::IterationLimit(bound)) => return Err(WfcError::IterationLimit(bound)),
            Err(_) => {}
        }

        // This candidate cannot work; make the parent wave remember that.
        wave.collapse(cell, !M::bit(id.0));
        candidates.swap(pick, remaining - 1);
        remaining -= 1;
    }

    Err(WfcError::Exhausted)
}

/// Collapses `cell` to the singleton `{id}` and fires the collapse hook.
fn collapse_cell<W, VM, M, S>(
    state: &mut SolverState<'_, W, S>,
    map: &VM,
    config: &WfcConfig<W, M>,
    wave: &mut Wave<'_, M>,
    cell: usize,
    id: VariableId,
) where
    W: World,
    VM: VariableMap<Value = W::Value>,
    M: Mask,
    S: ValueSelector,
{
    debug_assert!(
        !wave.is_collapsed(cell) || wave.mask(cell) == M::bit(id.0),
        "collapsing a cell that is already decided differently"
    );
    wave.collapse(cell, M::bit(id.0));
    debug_assert!(wave.is_collapsed(cell));

    if let Some(hook) = config.on_cell_collapsed.as_ref() {
        refresh_world(state.world, map, wave);
        hook(state.world);
    }
}

/// Writes the wave's current decisions into the world.
///
/// Collapsed cells get their exact value. Undecided cells get their
/// lowest-index candidate as a best-effort preview (hooks observe a fully
/// populated world). Contradicted cells are left untouched.
fn refresh_world<W, VM, M>(world: &mut W, map: &VM, wave: &Wave<'_, M>)
where
    W: World,
    VM: VariableMap<Value = W::Value>,
    M: Mask,
{
    for cell in 0..wave.len() {
        if !wave.is_contradicted(cell) {
            world.set_value(cell, map.value_of(wave.variable_id(cell)));
        }
    }
}

fn first_contradicted<M: Mask>(wave: &Wave<'_, M>) -> usize {
    (0..wave.len())
        .find(|&cell| wave.is_contradicted(cell))
        .unwrap_or(0)
}
