pub mod build;
pub mod config;
pub mod error;
pub mod git;
pub mod install;
pub mod orchestrator;
pub mod remote;
pub mod resolve;
pub mod version;

pub use config::InstallConfig;
pub use error::{Error, Result};
pub use install::Installation;
pub use orchestrator::{Orchestrator, Outcome};
