//! Sequential host versions of the block primitives.
//!
//! These treat the whole tile as one slice in block order, which is exactly
//! what a cube computes collectively over its blocked arrangement. Kernel
//! tests and the bundled example compare device results against them.

/// `flags[i] = flag(input[i - 1], input[i])`. The first item is compared
/// against `predecessor` if there is one, otherwise it is always flagged.
pub fn flag_heads<T: Copy>(
    input: &[T],
    predecessor: Option<T>,
    flag: impl Fn(T, T) -> bool,
) -> Vec<bool> {
    input
        .iter()
        .enumerate()
        .map(|(i, &item)| match (i, predecessor) {
            (0, Some(prev)) => flag(prev, item),
            (0, None) => true,
            _ => flag(input[i - 1], item),
        })
        .collect()
}

/// `flags[i] = flag(input[i], input[i + 1])`. The last item is compared
/// against `successor` if there is one, otherwise it is always flagged.
pub fn flag_tails<T: Copy>(
    input: &[T],
    successor: Option<T>,
    flag: impl Fn(T, T) -> bool,
) -> Vec<bool> {
    let last = input.len().saturating_sub(1);
    input
        .iter()
        .enumerate()
        .map(|(i, &item)| {
            if i < last {
                flag(item, input[i + 1])
            } else {
                successor.is_none_or(|next| flag(item, next))
            }
        })
        .collect()
}

/// `output[i] = op(input[i], input[i - 1])`. `output[0]` is only written
/// when `predecessor` is given.
pub fn subtract_left<T: Copy, O>(
    input: &[T],
    output: &mut [O],
    predecessor: Option<T>,
    op: impl Fn(T, T) -> O,
) {
    subtract_left_partial(input, output, predecessor, input.len(), op);
}

/// [`subtract_left`] for the first `valid_items` positions only. The rest of
/// `output` is left as it was.
pub fn subtract_left_partial<T: Copy, O>(
    input: &[T],
    output: &mut [O],
    predecessor: Option<T>,
    valid_items: usize,
    op: impl Fn(T, T) -> O,
) {
    assert_eq!(input.len(), output.len(), "tile length mismatch");
    let valid = valid_items.min(input.len());
    for i in 0..valid {
        if i > 0 {
            output[i] = op(input[i], input[i - 1]);
        } else if let Some(prev) = predecessor {
            output[0] = op(input[0], prev);
        }
    }
}

/// `output[i] = op(input[i], input[i + 1])`. The last output is only written
/// when `successor` is given.
pub fn subtract_right<T: Copy, O>(
    input: &[T],
    output: &mut [O],
    successor: Option<T>,
    op: impl Fn(T, T) -> O,
) {
    assert_eq!(input.len(), output.len(), "tile length mismatch");
    let Some(last) = input.len().checked_sub(1) else {
        return;
    };
    for i in 0..last {
        output[i] = op(input[i], input[i + 1]);
    }
    if let Some(next) = successor {
        output[last] = op(input[last], next);
    }
}

/// [`subtract_right`] where only items whose successor lies inside the first
/// `valid_items` positions are written.
pub fn subtract_right_partial<T: Copy, O>(
    input: &[T],
    output: &mut [O],
    valid_items: usize,
    op: impl Fn(T, T) -> O,
) {
    assert_eq!(input.len(), output.len(), "tile length mismatch");
    let valid = valid_items.min(input.len());
    for i in 0..valid.saturating_sub(1) {
        output[i] = op(input[i], input[i + 1]);
    }
}
