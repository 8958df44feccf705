// rtenv Core - Domain Logic & Ports
// NO infrastructure dependencies: process trees and subprocesses live behind ports

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{EnvError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
