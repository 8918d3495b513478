#![allow(dead_code)]

use std::{
    fmt::Display,
    hash::{DefaultHasher, Hasher},
};

use cubecl::{prelude::*, server::Handle};

#[cfg(all(
    any(test, feature = "test-utils"),
    not(any(feature = "cuda", feature = "rocm", feature = "wgpu", feature = "cpu"))
))]
pub type TestRuntime = compile_error!(
    "At least one backend must be enabled for test-utils, please run with `--features cuda/rocm/wgpu/cpu`"
);

#[cfg(feature = "rocm")]
pub type TestRuntime = cubecl::hip::HipRuntime;

#[cfg(feature = "cuda")]
pub type TestRuntime = cubecl::cuda::CudaRuntime;

#[cfg(feature = "wgpu")]
pub type TestRuntime = cubecl::wgpu::WgpuRuntime;

#[cfg(feature = "cpu")]
pub type TestRuntime = cubecl::cpu::CpuRuntime;

pub use half::{bf16, f16};
use rand::{RngExt, rngs::StdRng};

/// Tests a CubeCL kernel that works on scalar, blocked tiles against a host reference.
///
/// # Syntax
///
/// ```ignore
/// test_kernel! {
///     #[test_attributes]
///     fn test_name(test_args) for F in [f32, f64] B in [B4, B32] {
///         seed(optional_seed);
///
///         let var_name: Array = [len] as Distribution;
///
///         {
///             // Optional preamble, declarations stay visible afterwards.
///         }
///
///         assert_eq!(
///             kernel_name(arg_spec, ...) for (cube_x, cube_y, cube_z) @ block(B),
///             { reference_code }
///         );
///     }
/// }
/// ```
///
/// - **Element types**: `for F in [f16, bf16, f32, f64]` or `for F in all`.
/// - **Block shapes**: optional `B in [..]` list of [`BlockDim`](crate::block_dim::BlockDim)
///   markers. Each combination becomes its own test, e.g. `test_name_f32_b32`.
///   The kernel is launched as `kernel::launch::<F, B, TestRuntime>`.
/// - **Seed**: defaults to a hash of the test name.
/// - **Variables**: host `Vec<F>`s uploaded as line-size-1 arrays.
///   Distributions: `Range`, `Uniform(lo, hi)` (the default is `Uniform(-10.0, 10.0)`),
///   `Runs(len)` (`i / len`, sorted runs), `Choice(n)` (random integers in `0..n`),
///   `Fill(v)`.
/// - **Kernel args**: `var()` passes a variable, `lit(expr)` passes a value as is
///   (comptime args), `scalar(expr)` wraps a scalar launch arg.
/// - **Dims**: `(x)`, `(x, y)`, `(x, y, z)` or `block(B)` for `B::cube_dim()`.
/// - **Reference**: mutates the variables into their expected values. Every
///   variable is downloaded and compared afterwards, so inputs must stay untouched.
#[macro_export]
macro_rules! test_kernel {
    // ==================== ENTRY POINT ====================
    {
    $(
        $(#[$attr:meta])*
        fn $name:ident($($args:tt)*)
            for $float_name:ident in $float_list:tt
                $($block_name:ident in [$($block_ty:ident),+ $(,)?])?
        {
            $(seed($seed:expr);)?

            $(
            let $var:ident: Array = [$len:expr] $(as $distrib:ident $(($($distrib_param:expr),+))?)?;
            )*

            $({
                $($preamble:stmt)*
            })?

            assert_eq!(
                $kernel:ident ($($kernel_arg_name:ident($($kernel_arg:expr)?)),* $(,)?)
                    for ($($count:expr),*) @ $($dim_kind:ident)? ($($dim:tt)*),
                $ref:expr $(,)?
            );
        }
    )*
    } => {
    $(
        $crate::test_kernel! {
            @floats $float_list;
            blocks: [$($block_name: $($block_ty),+)?];
            ctx: {
                attrs: [$(#[$attr])*];
                name: $name;
                float_name: $float_name;
                args: ($($args)*);
                seed: ($($seed)?);
                vars: [$($var = [$len] $(as $distrib $(($($distrib_param),+))?)?;)*];
                preamble: { $($($preamble)*)? };
                kernel: $kernel;
                kernel_args: ($($kernel_arg_name($($kernel_arg)?)),*);
                count: ($($count),*);
                dim: ($($dim_kind)?) ($($dim)*);
                ref: $ref;
            };
        }
    )*
    };

    // ==================== TYPE EXPANSION ====================
    { @floats all; blocks: $blocks:tt; ctx: $ctx:tt; } => {
        $crate::test_kernel! { @floats [f16, bf16, f32, f64]; blocks: $blocks; ctx: $ctx; }
    };

    { @floats [$($float_ty:ident),+ $(,)?]; blocks: $blocks:tt; ctx: $ctx:tt; } => {
    $(
        $crate::test_kernel! { @blocks $float_ty; $blocks; $ctx }
    )+
    };

    { @blocks $float_ty:ident; []; $ctx:tt } => {
        $crate::test_kernel! { @emit $float_ty; (); $ctx }
    };

    { @blocks $float_ty:ident; [$block_name:ident: $($block_ty:ident),+]; $ctx:tt } => {
    $(
        $crate::test_kernel! { @emit $float_ty; ($block_name = $block_ty); $ctx }
    )+
    };

    // ==================== TEST BODY ====================
    {
        @emit $float_ty:ident; ($($block_name:ident = $block_ty:ident)?);
        {
            attrs: [$(#[$attr:meta])*];
            name: $name:ident;
            float_name: $float_name:ident;
            args: ($($args:tt)*);
            seed: ($($seed:expr)?);
            vars: [$($var:ident = [$len:expr] $(as $distrib:ident $(($($distrib_param:expr),+))?)?;)*];
            preamble: { $($preamble:stmt)* };
            kernel: $kernel:ident;
            kernel_args: ($($kernel_arg_name:ident($($kernel_arg:expr)?)),*);
            count: ($($count:expr),*);
            dim: ($($dim_kind:ident)?) ($($dim:tt)*);
            ref: $ref:expr;
        }
    } => {
        ::paste::paste! {
            $(#[$attr])*
            #[allow(unused_mut)]
            fn [< $name _ $float_ty $(_ $block_ty:snake)? >]($($args)*) {
                #[allow(dead_code)]
                type $float_name = $crate::test_kernel!{ @resolve_float_ty $float_ty };
                $(
                    #[allow(dead_code)]
                    type $block_name = $block_ty;
                )?

                // 1. Setup: compute client and RNG
                let client = $crate::test_utils::client();

                use rand::SeedableRng;
                #[allow(unused_variables)]
                let mut rng = rand::rngs::StdRng::seed_from_u64(
                    $crate::test_kernel!{ @seed($name) ($($seed)?) }
                );

                // 2. Initialize host data
                $(
                    let mut $var: Vec<$float_name> =
                        $crate::test_kernel!{ @init_val($float_name, rng, $len) $(as $distrib $(($($distrib_param),+))?)? };
                )*

                $($preamble)*

                // 3. Upload and build launch args
                $(
                    let [< $var _handle >] = $crate::test_utils::upload(&client, &$var);
                    let [< $var _arg >]: ArrayArg<'_, $crate::test_utils::TestRuntime> = unsafe {
                        ArrayArg::from_raw_parts::<$float_name>(&[< $var _handle >], $var.len(), 1)
                    };
                )*

                // 4. Launch
                println!("Launching {}", stringify!($kernel));
                $kernel::launch::<$float_name $(, $block_name)?, $crate::test_utils::TestRuntime>(
                    &client,
                    CubeCount::Static($(($count) as u32),*),
                    $crate::test_kernel!{ @dim ($($dim_kind)?) ($($dim)*) },
                    $(
                        $crate::test_kernel!{ @arg([< $kernel_arg_name _arg >]) $kernel_arg_name($($kernel_arg)?) }
                    ),*
                ).expect("Kernel launch failed");

                // 5. Reference (mutates the host vectors)
                $ref;

                // 6. Compare
                $(
                    let [< $var _kernel_data >] =
                        $crate::test_utils::download::<$float_name>(&client, [< $var _handle >]);
                    $crate::test_utils::slices_eq(&[< $var _kernel_data >], &$var, stringify!($var));
                )*
            }
        }
    };

    { @resolve_float_ty bf16 } => { ::half::bf16 };
    { @resolve_float_ty f16 } => { ::half::f16 };
    { @resolve_float_ty f32 } => { f32 };
    { @resolve_float_ty f64 } => { f64 };

    // ==================== HELPER: KERNEL ARGUMENTS (@arg) ====================
    { @arg($arg_name:ident) $_:ident() } => { $arg_name };
    { @arg($arg_name:ident) lit($arg:expr) } => { $arg };
    { @arg($arg_name:ident) scalar($arg:expr) } => { ::cubecl::frontend::ScalarArg { elem: $arg } };

    // ==================== HELPER: SEED (@seed) ====================
    { @seed($name:ident) () } => { $crate::test_utils::string_to_seed(stringify!($name)) };
    { @seed($name:ident) ($seed:expr) } => { $seed };

    // ==================== HELPER: CUBE DIMENSIONS (@dim) ====================
    { @dim (block) ($block:ty) } => { <$block as $crate::block_dim::BlockDim>::cube_dim() };
    { @dim () ($x:expr) } => { CubeDim::new_1d($x as u32) };
    { @dim () ($x:expr, $y:expr) } => { CubeDim::new_2d($x as u32, $y as u32) };
    { @dim () ($x:expr, $y:expr, $z:expr) } => { CubeDim::new_3d($x as u32, $y as u32, $z as u32) };

    // ==================== HELPER: DATA INITIALIZATION (@init_val) ====================
    { @init_val($t:ty, $rng:ident, $len:expr) } => {
        $crate::test_kernel!{ @init_val($t, $rng, $len) as Uniform(-10.0, 10.0) }
    };
    { @init_val($t:ty, $rng:ident, $len:expr) as Range } => {
        $crate::test_utils::range_vec::<$t>($len)
    };
    { @init_val($t:ty, $rng:ident, $len:expr) as Uniform($start:expr, $end:expr) } => {
        $crate::test_utils::random_vec::<$t>(&mut $rng, $len, $start, $end)
    };
    { @init_val($t:ty, $rng:ident, $len:expr) as Runs($run:expr) } => {
        $crate::test_utils::runs_vec::<$t>($len, $run)
    };
    { @init_val($t:ty, $rng:ident, $len:expr) as Choice($n:expr) } => {
        $crate::test_utils::choice_vec::<$t>(&mut $rng, $len, $n)
    };
    { @init_val($t:ty, $rng:ident, $len:expr) as Fill($value:expr) } => {
        vec![<$t as $crate::test_utils::TestFloat>::from_f64($value); $len]
    };
}

pub fn client() -> TestClient {
    TestRuntime::client(&<TestRuntime as cubecl::Runtime>::Device::default())
}

pub type TestClient = ComputeClient<TestRuntime>;

pub fn range_vec<F: TestFloat>(len: usize) -> Vec<F> {
    (0..len).map(|i| F::from_int(i as i64)).collect()
}

/// Sorted runs of `run` equal values: `0, 0, 1, 1, ...` for `run == 2`.
pub fn runs_vec<F: TestFloat>(len: usize, run: usize) -> Vec<F> {
    assert!(run > 0, "run length must be positive");
    (0..len).map(|i| F::from_int((i / run) as i64)).collect()
}

/// Random small integers, so that equal neighbors are common.
pub fn choice_vec<F: TestFloat>(rng: &mut StdRng, len: usize, n: u32) -> Vec<F> {
    (0..len)
        .map(|_| F::from_int(rng.random_range(0..n) as i64))
        .collect()
}

pub fn string_to_seed(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(s.as_bytes());
    hasher.finish()
}

pub fn random_vec<F: TestFloat>(rng: &mut StdRng, len: usize, start: f64, end: f64) -> Vec<F> {
    (0..len)
        .map(|_| F::from_f64(rng.random_range(start..end)))
        .collect()
}

pub fn upload<F: TestFloat>(client: &TestClient, data: &[F]) -> Handle {
    client.create_from_slice(F::as_bytes(data))
}

pub fn download<F: TestFloat>(client: &TestClient, handle: Handle) -> Vec<F> {
    F::from_bytes(&client.read_one(handle)).to_vec()
}

/// Assert two values are approximately equal.
pub fn approx_eq<F: TestFloat>(actual: F, expected: F) -> bool {
    let (a, e) = (actual.into_f64(), expected.into_f64());
    let diff = (a - e).abs();
    let tol = F::atol() + F::rtol() * e.abs();
    diff <= tol
}

/// Assert slices are approximately equal.
pub fn slices_eq<F: TestFloat>(actual: &[F], expected: &[F], ctx: &str) {
    assert_eq!(actual.len(), expected.len(), "{ctx}: length mismatch");

    let mut passed = true;
    for (i, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        if !approx_eq(a, e) {
            passed = false;
            println!("{ctx}[{i}] mismatch: expected {e}, got {a}");
        }
    }

    if !passed {
        panic!("{} mismatch", ctx);
    }
}

pub trait TestFloat: CubeElement + CubePrimitive + Float + Copy + Display {
    fn into_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;
    fn rtol() -> f64;
    fn atol() -> f64;
}

impl TestFloat for f64 {
    fn into_f64(self) -> f64 {
        self
    }
    fn from_f64(v: f64) -> Self {
        v
    }
    fn rtol() -> f64 {
        1e-12
    }
    fn atol() -> f64 {
        1e-12
    }
}

impl TestFloat for f32 {
    fn into_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(v: f64) -> Self {
        v as f32
    }
    fn rtol() -> f64 {
        1e-4
    }
    fn atol() -> f64 {
        1e-4
    }
}

impl TestFloat for f16 {
    fn into_f64(self) -> f64 {
        self.to_f64()
    }
    fn from_f64(v: f64) -> Self {
        f16::from_f64(v)
    }
    fn rtol() -> f64 {
        1e-2
    }
    fn atol() -> f64 {
        1e-2
    }
}

impl TestFloat for bf16 {
    fn into_f64(self) -> f64 {
        self.to_f64()
    }
    fn from_f64(v: f64) -> Self {
        bf16::from_f64(v)
    }
    fn rtol() -> f64 {
        5e-2
    }
    fn atol() -> f64 {
        5e-2
    }
}

// These tests are for the harness itself, not for any primitive
#[cfg(test)]
mod harness_tests {
    use cubecl::prelude::*;
    use rand::SeedableRng;
    use test_case::test_matrix;

    use super::*;
    use crate::block_dim::{B4, B8x8, BlockDim};

    #[cube(launch)]
    fn noop<F: Float>(_x: &Array<F>) {}

    #[cube(launch)]
    fn fill_unit_pos<F: Float, B: BlockDim>(x: &mut Array<F>) {
        let tid = UNIT_POS as usize;
        if tid < comptime!(B::THREADS) {
            x[tid] = F::cast_from(UNIT_POS);
        }
    }

    test_kernel! {
        #[test]
        #[should_panic = "x mismatch"]
        fn mismatch_panics() for F in [f32] {
            let x: Array = [4] as Fill(1.0);
            assert_eq!(
                noop(x()) for (1, 1, 1) @ (1),
                {
                    x.fill(F::from_f64(0.0));
                }
            );
        }

        #[test_matrix([4, 16])]
        fn range_is_sequential(n: usize) for F in all {
            let x: Array = [n] as Range;

            assert_eq!(
                noop(x()) for (1, 1, 1) @ (1),
                {
                    for (i, x) in x.iter_mut().enumerate() {
                        *x = F::from_int(i as i64);
                    }
                }
            );
        }

        #[test]
        fn preamble_runs_before_upload() for F in [f32, f64] {
            let x: Array = [8] as Range;

            {
                x.fill(F::from_f64(3.0));
            }

            assert_eq!(
                noop(x()) for (1, 1, 1) @ (1),
                {
                    assert!(x.iter().all(|v| v.into_f64() == 3.0))
                }
            );
        }

        #[test]
        fn block_dims_launch_every_unit() for F in [f32] B in [B4, B8x8] {
            let x: Array = [B::THREADS] as Fill(-1.0);

            assert_eq!(
                fill_unit_pos(x()) for (1, 1, 1) @ block(B),
                {
                    for (i, x) in x.iter_mut().enumerate() {
                        *x = F::from_int(i as i64);
                    }
                }
            );
        }
    }

    #[test]
    fn runs_are_sorted_groups() {
        let v = runs_vec::<f32>(7, 3);
        assert_eq!(v, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn choice_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let v = choice_vec::<f64>(&mut rng, 256, 3);
        assert!(v.iter().all(|x| [0.0, 1.0, 2.0].contains(x)));
    }

    #[test]
    fn seed_is_stable() {
        assert_eq!(string_to_seed("abc"), string_to_seed("abc"));
        assert_ne!(string_to_seed("abc"), string_to_seed("abd"));
    }
}
