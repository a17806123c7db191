//! Headless core of the ViralFlow desktop front-end: the `.params` codec,
//! the parameter and config stores, the simulated setup/run workflow and the
//! log stream reducer that turns process output into display-ready entries.

pub mod about;
pub mod app;
pub mod config;
pub mod error;
pub mod log_stream;
pub mod params;
pub mod params_codec;
pub mod params_store;
pub mod runner;
pub mod session;
pub mod shell;
pub mod tools;

pub use viralflow_protocol as protocol;
