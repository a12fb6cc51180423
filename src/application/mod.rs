pub mod directory;
pub mod lifecycle;
pub mod registry;
pub mod replicate;
pub mod script;
