pub mod partition;
pub mod confusion;
pub mod crossval;
pub mod results;

pub use crossval::CrossValidator;
pub use results::{FoldReport, RunReport};
