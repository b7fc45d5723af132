//! Incremental directory backup, restore, and verification.
//!
//! A backup diffs a source directory against whatever's already at the
//! backup root, turns that diff into a plan of filesystem actions, and
//! executes them through an optional compress/encrypt codec pipeline.
//! See [`executor`] for the write side and [`restore`] for the inverse.

pub mod codec;
pub mod config;
pub mod diff;
pub mod error;
pub mod executor;
pub mod file_util;
pub mod metadata;
pub mod plan;
pub mod restore;
pub mod tree;
