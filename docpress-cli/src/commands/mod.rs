//! CLI command implementations.

pub mod build;
pub mod check;
pub mod init;
pub mod run;

pub use build::build_site;
pub use check::check_site;
pub use init::init_project;
