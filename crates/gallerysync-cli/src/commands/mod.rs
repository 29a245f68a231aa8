pub mod config;
pub mod detect;
pub mod reset;
pub mod status;
pub mod sync;
pub mod tick;
