//! Anonymous credentials built on CL signatures over a hidden-order group.
//!
//! The `cl` module holds the three-round blind issuance protocol and the
//! Fiat–Shamir show-proof engine. `bn` wraps arbitrary precision arithmetic
//! and `errors` carries the typed failures every operation returns.
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

// To use macros from util inside of other modules it must me loaded first.
#[macro_use]
pub mod utils;

pub mod bn;
pub mod cl;
pub mod errors;
