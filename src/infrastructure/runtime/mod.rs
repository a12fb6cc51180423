pub mod client;

pub use client::DockerCli;
