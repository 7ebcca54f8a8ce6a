pub mod coord;
pub mod nibble;
