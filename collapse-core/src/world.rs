/// Contract the engine needs from the problem's cell container.
///
/// Cells are indexed `[0, N)` and each holds one value of the world's value
/// type. Whatever topology helpers rule functions use (coordinate math,
/// neighbor lookups, wrapping or clamping at edges) live on the concrete
/// type; the engine never sees them.
///
/// The engine reads values only while seeding and writes them only when
/// refreshing the world from the wave (for event hooks and on success).
pub trait World {
    type Value: Copy + PartialEq;

    /// Number of cells, `N`.
    fn size(&self) -> usize;

    fn get_value(&self, cell: usize) -> Self::Value;

    fn set_value(&mut self, cell: usize, value: Self::Value);
}
