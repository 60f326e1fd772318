pub mod generator;
pub mod inference;
