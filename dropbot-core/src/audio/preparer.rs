// File: dropbot-core/src/audio/preparer.rs

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, warn};

use dropbot_common::models::ClipInventory;

use crate::Error;
use crate::audio::encoder::{ClipEncoder, is_partial_name};

pub const ENCODED_EXTENSION: &str = "dca";

/// `output_dir/<file name>.dca`
pub fn encoded_path_for(input: &Path, output_dir: &Path) -> Option<PathBuf> {
    let name = input.file_name()?;
    let mut encoded = name.to_os_string();
    encoded.push(".");
    encoded.push(ENCODED_EXTENSION);
    Some(output_dir.join(encoded))
}

/// Encodes every input file that has no cached counterpart yet, then returns
/// everything present in `output_dir`.
///
/// Any I/O or transcoding failure aborts the whole run; there is no partial
/// inventory.
pub async fn prepare_sounds(
    input_dir: &Path,
    output_dir: &Path,
    encoder: &dyn ClipEncoder,
) -> Result<ClipInventory, Error> {
    fs::create_dir_all(output_dir).await?;
    remove_partials(output_dir).await?;

    for input in list_files(input_dir).await? {
        let Some(output) = encoded_path_for(&input, output_dir) else {
            continue;
        };
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if fs::try_exists(&output).await? {
            info!("skipped [{}]", name);
            continue;
        }

        encoder.encode(&input, &output).await.map_err(|e| match e {
            Error::Encode(msg) => Error::Encode(format!("failed to encode {name}: {msg}")),
            other => other,
        })?;
        info!("encoded [{}]", name);
    }

    let inventory = ClipInventory::from_paths(list_files(output_dir).await?);
    info!(
        "Sound library ready: {} clip(s) in {}",
        inventory.len(),
        output_dir.display()
    );
    Ok(inventory)
}

/// Non-directory entries of `dir`, minus leftovers of interrupted encodes.
async fn list_files(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut entries = fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() || is_partial_name(&entry.file_name().to_string_lossy()) {
            continue;
        }
        files.push(entry.path());
    }
    Ok(files)
}

/// Deletes half-written encodes left by a killed process.
async fn remove_partials(output_dir: &Path) -> Result<(), Error> {
    let mut entries = fs::read_dir(output_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !is_partial_name(&entry.file_name().to_string_lossy()) {
            continue;
        }
        match fs::remove_file(entry.path()).await {
            Ok(()) => info!("removed leftover [{}]", entry.path().display()),
            Err(e) => warn!("could not remove leftover [{}]: {e}", entry.path().display()),
        }
    }
    Ok(())
}
