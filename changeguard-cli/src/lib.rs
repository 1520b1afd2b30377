//! Changeguard CLI library
//!
//! Changelog file loading and terminal output used by the `changeguard`
//! binary (main.rs).

pub mod changelog_file;
pub mod output;
