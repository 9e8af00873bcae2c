//! Post-process stage: cover art embedding.
//!
//! The merged file is mutated in place by the external `mp4art` tool. A job
//! without artwork skips this stage entirely. Failure here is a job failure;
//! the merged-but-untagged temp file is cleaned up, never published.

use std::path::Path;
use std::process::Command;

use log::{debug, info};

use crate::command;
use crate::error::{CoreError, Result};

pub fn embed_cover(target: &Path, artwork: Option<&Path>) -> Result<()> {
    let Some(artwork) = artwork else {
        debug!("no artwork supplied, skipping cover embedding");
        return Ok(());
    };

    info!(
        "embedding {} into {}",
        artwork.display(),
        target.display()
    );

    let mut cmd = Command::new("mp4art");
    cmd.arg("--add").arg(artwork).arg(target);
    command::run_command(&mut cmd)
        .map_err(|e| CoreError::PostProcess(format!("{}: {e}", target.display())))?;
    Ok(())
}
