#[macro_use]
pub mod logger;
pub mod commitment;
