pub mod admin;
pub mod pool;
