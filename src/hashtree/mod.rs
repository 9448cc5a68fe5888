//! Additive per-directory hash tree.

pub mod builder;
pub mod hasher;

pub use builder::{DirectoryHashTree, compute_and_record, compute_directory};
pub use hasher::file_hash;
