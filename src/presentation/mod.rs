pub mod cli_summary;
pub mod web;
