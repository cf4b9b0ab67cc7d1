/// Index of a value inside a [`VariableMap`](crate::VariableMap).
///
/// Variable ids are contiguous in `[0, V)` and double as bit positions in a
/// cell's domain mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableId(pub usize);
