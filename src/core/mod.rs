pub mod config;
pub mod io;
pub mod state;
pub mod style;
pub mod wizard;
