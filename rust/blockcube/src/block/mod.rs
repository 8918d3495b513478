mod adjacent_difference;

pub use adjacent_difference::*;
