//! Utility functions and helpers.

pub mod index_vec;

pub use index_vec::{Idx, IndexVec};
