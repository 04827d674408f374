//! Command modules - one file per CLI command

pub mod completions;
pub mod devices;
pub mod extract;
pub mod hash;
pub mod info;
pub mod install;
pub mod rename;
pub mod uninstall;
