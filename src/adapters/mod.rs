pub mod crypto;
pub mod database;
pub mod memory;
pub mod providers;
