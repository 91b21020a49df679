#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;

pub mod analyzer;
pub mod config;
pub mod extract;
pub mod fetcher;
pub mod lister;
pub mod llm;
pub mod pacing;
pub mod portal;
pub mod query;
pub mod store;
pub mod types;
