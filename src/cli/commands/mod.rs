//! Command implementations.

mod subscribe;

pub use subscribe::run_subscribe;
