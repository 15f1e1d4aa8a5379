pub mod sample;
pub mod dataset;

pub use sample::*;
pub use dataset::*;
