pub mod catalog;
pub mod setup;
