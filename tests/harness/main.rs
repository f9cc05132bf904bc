#[path = "../common/mod.rs"]
mod common;

mod config;
mod rewind;
mod serialization;
mod verification;
