pub mod cli;
pub mod core;
pub mod script;
pub mod services;
