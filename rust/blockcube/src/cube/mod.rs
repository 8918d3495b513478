mod adjacent_difference;

#[cfg(test)]
mod tests;

pub use adjacent_difference::*;
