pub mod application;
pub mod boot;
pub mod chooser;
pub mod commands;
pub mod error;
pub mod package;
pub mod policy;
pub mod release;
pub mod runtime;
