pub mod client;
pub mod decode;
pub mod sql;

pub use client::{connect, connect_single, SqlxTableStore};
