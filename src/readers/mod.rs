//! Readers for the container formats identity metadata is pulled from.
//!
//! Each reader is synchronous and side-effect free apart from reading the
//! files it is pointed at.

pub mod dex;
pub mod elf;
pub mod linux_manifest;
pub mod manifest;
pub mod plist;
pub mod sourcemap;

pub use manifest::ManifestData;
pub use plist::PlistData;
