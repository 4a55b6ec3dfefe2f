//! SGM: Switch Game Manager
//!
//! Keeps a catalog of XCI cartridge images across PC folders and an SD card,
//! backed by a persistent metadata cache.

pub mod cli;
pub mod core;
