//! Utility functions

/// Align value to power of 2
#[inline]
pub fn align_to(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Number of chunks of `capacity_per_chunk` slots needed to hold `slots`
#[inline]
pub fn chunks_needed(slots: usize, capacity_per_chunk: usize) -> usize {
    slots.div_ceil(capacity_per_chunk)
}

/// Two distinct elements of a slice, both mutably.
///
/// # Panics
/// Panics if `a == b` or either index is out of bounds.
pub(crate) fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b, "pair_mut requires two different indices");
    if a < b {
        let (low, high) = items.split_at_mut(b);
        (&mut low[a], &mut high[0])
    } else {
        let (low, high) = items.split_at_mut(a);
        (&mut high[0], &mut low[b])
    }
}
