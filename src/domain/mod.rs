pub mod errors;
pub mod fingerprint;
pub mod instance;
pub mod ports;
pub mod replication;
pub mod value_objects;
