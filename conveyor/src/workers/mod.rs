pub mod base;
pub mod pool;
