pub mod base;
pub mod hunter;
