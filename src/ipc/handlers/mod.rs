pub mod classes;
pub mod core;
pub mod roster_import;
pub mod sessions;
pub mod setup;
pub mod students;
