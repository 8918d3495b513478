use std::marker::PhantomData;

use cubecl::prelude::CubeDim;

/// Marker trait for compile-time block shapes.
/// CubeCL doesn't like const generics, so block extents live in associated consts.
///
/// `THREADS` is the number of units that cooperate on one tile. It asserts
/// that the shape is non-empty, so naming it for a zero-sized block is a
/// compile error rather than a silent no-op kernel.
pub trait BlockDim: Send + Sync + 'static {
    const X: usize;
    const Y: usize = 1;
    const Z: usize = 1;

    const THREADS: usize = {
        let threads = Self::X * Self::Y * Self::Z;
        assert!(
            threads > 0,
            "BLOCK_DIM_X * BLOCK_DIM_Y * BLOCK_DIM_Z must be greater than 0"
        );
        threads
    };

    /// The launch dimensions matching this block shape.
    fn cube_dim() -> CubeDim {
        CubeDim::new_3d(Self::X as u32, Self::Y as u32, Self::Z as u32)
    }

    /// Number of items in a full tile.
    fn tile_len(items_per_thread: usize) -> usize {
        Self::THREADS * items_per_thread
    }
}

/// Declares marker types implementing [`BlockDim`].
///
/// ```ignore
/// block_dim! {
///     /// 48 units in a single row.
///     pub B48 = (48);
///     pub B12x4 = (12, 4);
/// }
/// ```
#[macro_export]
macro_rules! block_dim {
    {
    $(
        $(#[$attr:meta])*
        $vis:vis $name:ident = ($x:expr $(, $y:expr $(, $z:expr)?)?);
    )+
    } => {
    $(
        $(#[$attr])*
        $vis struct $name;
        impl $crate::block_dim::BlockDim for $name {
            const X: usize = $x;
            $(
            const Y: usize = $y;
            $(const Z: usize = $z;)?
            )?
        }
    )+
    };
}

block_dim! {
    /// A single unit. Degenerate, but handy for checking boundary handling.
    pub B1 = (1);
    pub B2 = (2);
    pub B4 = (4);
    pub B8 = (8);
    pub B16 = (16);
    pub B32 = (32);
    pub B64 = (64);
    pub B128 = (128);
    pub B256 = (256);
    pub B512 = (512);
    pub B1024 = (1024);

    pub B8x8 = (8, 8);
    pub B16x16 = (16, 16);
    pub B32x8 = (32, 8);
    pub B4x4x4 = (4, 4, 4);
    pub B8x8x4 = (8, 8, 4);
}

/// Architecture tag, kept so call sites migrating from CUB-style code keep
/// their shape. It never affects code generation.
pub trait Arch: Send + Sync + 'static {
    const NAME: &'static str;
}

macro_rules! impl_arch {
    ($($name:ident => $label:literal),+ $(,)?) => {
        $(
            pub struct $name;
            impl Arch for $name {
                const NAME: &'static str = $label;
            }
        )+
    };
}

impl_arch! {
    AnyArch => "any",
    Sm70 => "sm_70",
    Sm80 => "sm_80",
    Sm90 => "sm_90",
    Gfx90a => "gfx90a",
    Gfx942 => "gfx942",
}

/// Zero-sized type for carrying block shape and arch without runtime cost.
pub type BlockPhantom<B, A> = PhantomData<(B, A)>;
