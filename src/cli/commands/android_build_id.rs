//! `create-android-build-id`

use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::resolvers::build::android_build_id;
use std::path::PathBuf;

/// Print the DEX-derived build id on stdout
pub(super) fn execute_android_build_id(paths: &[PathBuf], config: &RuntimeConfig) -> Result<()> {
    config
        .output()
        .debug(&format!("Reading classes*.dex from {} paths", paths.len()));
    let id = android_build_id(paths)?;
    println!("{id}");
    Ok(())
}
