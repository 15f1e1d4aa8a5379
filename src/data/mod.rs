pub mod libsvm;

pub use libsvm::load_libsvm;
