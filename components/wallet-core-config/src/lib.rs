extern crate serde;

#[macro_use]
extern crate serde_derive;

pub mod config;
pub mod generator;
pub mod toml;

pub use config::*;
