//! Rust rewrite of the QPKG trailer tagging utility. The crate reads the
//! fixed-width metadata trailer QNAP packages carry in their last 100 bytes,
//! derives the size tag, and writes it back in place.

pub mod cli;
pub mod config;
pub mod logging;
pub mod trailer;
