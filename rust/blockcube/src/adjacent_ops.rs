//! Operators for adjacent-item primitives.
//!
//! [`FlagOp`] decides whether two neighbors form a discontinuity, and
//! [`DifferenceOp`] combines an item with one of its neighbors. Both are
//! called with the items in sequence-relative roles, see each trait.

use cubecl::prelude::*;

/// Discontinuity predicate. `prev` precedes `next` in the block-wide sequence.
#[cube]
pub trait FlagOp<T: Numeric> {
    fn flag(&self, prev: T, next: T) -> bool;
}

/// Neighbor difference. `item` is the item being written, `neighbor` is its
/// predecessor for subtract-left and its successor for subtract-right.
#[cube]
pub trait DifferenceOp<T: Numeric, O: Numeric> {
    fn apply(&self, item: T, neighbor: T) -> O;
}

macro_rules! impl_flag_ops {
    {
    $(
        $name:ident<$t:ident>($prev:ident, $next:ident) => $body:expr;
    )+
    } => {
    $(
        ::paste::paste! {
            #[derive(CubeType)]
            pub struct [<$name Op>];

            // The CubeType derive doesn't handle unit structs too nicely,
            // so we have to hand-impl this
            impl From<[<$name Op>]> for [<$name OpExpand>] {
                fn from(_: [<$name Op>]) -> Self {
                    [<$name OpExpand>] {}
                }
            }

            #[cube]
            impl<$t: Numeric> FlagOp<$t> for [<$name Op>] {
                fn flag(&self, $prev: $t, $next: $t) -> bool {
                    $body
                }
            }
        }
    )+
    };
}

macro_rules! impl_difference_ops {
    {
    $(
        $name:ident<$t:ident, $o:ident>($item:ident, $neighbor:ident) => $body:expr;
    )+
    } => {
    $(
        ::paste::paste! {
            #[derive(CubeType)]
            pub struct [<$name Op>];

            impl From<[<$name Op>]> for [<$name OpExpand>] {
                fn from(_: [<$name Op>]) -> Self {
                    [<$name OpExpand>] {}
                }
            }

            #[cube]
            impl<$t: Numeric, $o: Numeric> DifferenceOp<$t, $o> for [<$name Op>] {
                #[allow(unused_variables)]
                fn apply(&self, $item: $t, $neighbor: $t) -> $o {
                    $body
                }
            }
        }
    )+
    };
}

impl_flag_ops! {
    NotEqual<T>(prev, next) => prev != next;
    Equal<T>(prev, next) => prev == next;
    // Strictly ascending / descending steps
    Less<T>(prev, next) => prev < next;
    Greater<T>(prev, next) => prev > next;
}

impl_difference_ops! {
    Sub<T, O>(item, neighbor) => O::cast_from(item - neighbor);
    Add<T, O>(item, neighbor) => O::cast_from(item + neighbor);
    // Branch instead of `abs` so unsigned element types work too
    AbsDiff<T, O>(item, neighbor) => {
        if item > neighbor {
            O::cast_from(item - neighbor)
        } else {
            O::cast_from(neighbor - item)
        }
    };
    First<T, O>(item, neighbor) => O::cast_from(item);
    Second<T, O>(item, neighbor) => O::cast_from(neighbor);
}

/// Flags `next` when it rises above `prev` by more than `gap`.
#[derive(CubeType)]
pub struct GapOp<T: Numeric> {
    gap: T,
}

#[cube]
impl<T: Numeric> GapOp<T> {
    pub fn new(gap: T) -> Self {
        GapOp::<T> { gap }
    }
}

#[cube]
impl<T: Numeric> FlagOp<T> for GapOp<T> {
    fn flag(&self, prev: T, next: T) -> bool {
        next > prev && next - prev > self.gap
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_matrix;

    use super::*;
    use crate::{test_kernel, test_utils::TestFloat};

    #[cube]
    fn flag_value<F: Float, O: FlagOp<F>>(op: O, prev: F, next: F) -> F {
        if op.flag(prev, next) {
            F::from_int(1)
        } else {
            F::from_int(0)
        }
    }

    #[cube]
    fn difference_value<F: Float, O: DifferenceOp<F, F>>(op: O, item: F, neighbor: F) -> F {
        op.apply(item, neighbor)
    }

    macro_rules! generate_flag_kernel {
        ($name:ident, $op:ident) => {
            #[cube(launch)]
            fn $name<F: Float + CubeElement>(
                prev: &Array<F>,
                next: &Array<F>,
                output: &mut Array<F>,
            ) {
                let i = UNIT_POS as usize;
                output[i] = flag_value::<F, $op>($op, prev[i], next[i]);
            }
        };
    }

    macro_rules! generate_difference_kernel {
        ($name:ident, $op:ident) => {
            #[cube(launch)]
            fn $name<F: Float + CubeElement>(
                item: &Array<F>,
                neighbor: &Array<F>,
                output: &mut Array<F>,
            ) {
                let i = UNIT_POS as usize;
                output[i] = difference_value::<F, $op>($op, item[i], neighbor[i]);
            }
        };
    }

    generate_flag_kernel!(not_equal_kernel, NotEqualOp);
    generate_flag_kernel!(equal_kernel, EqualOp);
    generate_flag_kernel!(less_kernel, LessOp);
    generate_flag_kernel!(greater_kernel, GreaterOp);

    generate_difference_kernel!(sub_kernel, SubOp);
    generate_difference_kernel!(add_kernel, AddOp);
    generate_difference_kernel!(abs_diff_kernel, AbsDiffOp);
    generate_difference_kernel!(first_kernel, FirstOp);
    generate_difference_kernel!(second_kernel, SecondOp);

    #[cube(launch)]
    fn gap_kernel<F: Float + CubeElement>(
        prev: &Array<F>,
        next: &Array<F>,
        output: &mut Array<F>,
        gap: F,
    ) {
        let i = UNIT_POS as usize;
        output[i] = flag_value::<F, GapOp<F>>(GapOp::<F>::new(gap), prev[i], next[i]);
    }

    const PAIRS: usize = 64;

    fn flag_f64(flag: bool) -> f64 {
        if flag { 1.0 } else { 0.0 }
    }

    test_kernel! {
        #[test]
        fn not_equal_flags() for F in [f32, f64] {
            let prev: Array = [PAIRS] as Choice(3);
            let next: Array = [PAIRS] as Choice(3);
            let output: Array = [PAIRS];

            assert_eq!(
                not_equal_kernel(prev(), next(), output()) for (1, 1, 1) @ (PAIRS),
                {
                    for i in 0..PAIRS {
                        output[i] = F::from_f64(flag_f64(prev[i] != next[i]));
                    }
                }
            );
        }

        #[test]
        fn equal_flags() for F in [f32, f64] {
            let prev: Array = [PAIRS] as Choice(3);
            let next: Array = [PAIRS] as Choice(3);
            let output: Array = [PAIRS];

            assert_eq!(
                equal_kernel(prev(), next(), output()) for (1, 1, 1) @ (PAIRS),
                {
                    for i in 0..PAIRS {
                        output[i] = F::from_f64(flag_f64(prev[i] == next[i]));
                    }
                }
            );
        }

        #[test]
        fn less_flags() for F in [f32, f64] {
            let prev: Array = [PAIRS] as Choice(4);
            let next: Array = [PAIRS] as Choice(4);
            let output: Array = [PAIRS];

            assert_eq!(
                less_kernel(prev(), next(), output()) for (1, 1, 1) @ (PAIRS),
                {
                    for i in 0..PAIRS {
                        output[i] = F::from_f64(flag_f64(prev[i].into_f64() < next[i].into_f64()));
                    }
                }
            );
        }

        #[test]
        fn greater_flags() for F in [f32, f64] {
            let prev: Array = [PAIRS] as Choice(4);
            let next: Array = [PAIRS] as Choice(4);
            let output: Array = [PAIRS];

            assert_eq!(
                greater_kernel(prev(), next(), output()) for (1, 1, 1) @ (PAIRS),
                {
                    for i in 0..PAIRS {
                        output[i] = F::from_f64(flag_f64(prev[i].into_f64() > next[i].into_f64()));
                    }
                }
            );
        }

        #[test_matrix([0.5, 2.0])]
        fn gap_flags(gap: f64) for F in [f32, f64] {
            let prev: Array = [PAIRS] as Choice(5);
            let next: Array = [PAIRS] as Choice(5);
            let output: Array = [PAIRS];

            assert_eq!(
                gap_kernel(prev(), next(), output(), scalar(F::from_f64(gap))) for (1, 1, 1) @ (PAIRS),
                {
                    for i in 0..PAIRS {
                        let step = next[i].into_f64() - prev[i].into_f64();
                        output[i] = F::from_f64(flag_f64(step > gap));
                    }
                }
            );
        }

        #[test]
        fn sub_difference() for F in [f32, f64] {
            let item: Array = [PAIRS] as Uniform(-10.0, 10.0);
            let neighbor: Array = [PAIRS] as Uniform(-10.0, 10.0);
            let output: Array = [PAIRS];

            assert_eq!(
                sub_kernel(item(), neighbor(), output()) for (1, 1, 1) @ (PAIRS),
                {
                    for i in 0..PAIRS {
                        output[i] = F::from_f64(item[i].into_f64() - neighbor[i].into_f64());
                    }
                }
            );
        }

        #[test]
        fn add_difference() for F in [f32, f64] {
            let item: Array = [PAIRS] as Uniform(-10.0, 10.0);
            let neighbor: Array = [PAIRS] as Uniform(-10.0, 10.0);
            let output: Array = [PAIRS];

            assert_eq!(
                add_kernel(item(), neighbor(), output()) for (1, 1, 1) @ (PAIRS),
                {
                    for i in 0..PAIRS {
                        output[i] = F::from_f64(item[i].into_f64() + neighbor[i].into_f64());
                    }
                }
            );
        }

        #[test]
        fn abs_diff_difference() for F in [f32, f64] {
            let item: Array = [PAIRS] as Uniform(-10.0, 10.0);
            let neighbor: Array = [PAIRS] as Uniform(-10.0, 10.0);
            let output: Array = [PAIRS];

            assert_eq!(
                abs_diff_kernel(item(), neighbor(), output()) for (1, 1, 1) @ (PAIRS),
                {
                    for i in 0..PAIRS {
                        output[i] = F::from_f64((item[i].into_f64() - neighbor[i].into_f64()).abs());
                    }
                }
            );
        }

        #[test]
        fn first_selects_item() for F in [f32, f64] {
            let item: Array = [PAIRS] as Range;
            let neighbor: Array = [PAIRS] as Uniform(-10.0, 10.0);
            let output: Array = [PAIRS];

            assert_eq!(
                first_kernel(item(), neighbor(), output()) for (1, 1, 1) @ (PAIRS),
                {
                    output.copy_from_slice(&item);
                }
            );
        }

        #[test]
        fn second_selects_neighbor() for F in [f32, f64] {
            let item: Array = [PAIRS] as Range;
            let neighbor: Array = [PAIRS] as Uniform(-10.0, 10.0);
            let output: Array = [PAIRS];

            assert_eq!(
                second_kernel(item(), neighbor(), output()) for (1, 1, 1) @ (PAIRS),
                {
                    output.copy_from_slice(&neighbor);
                }
            );
        }
    }
}
