//! `add`, `update`, `ls` and `rm`.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use fstore_client::{StoreClient, UploadOutcome};
use fstore_core::protocol::FileNameErrorPair;

/// Arguments for `add` and `update`.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local files to store. The server keeps only the base name.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Arguments for `rm`.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Stored file names to delete.
    #[arg(required = true)]
    pub names: Vec<String>,
}

pub async fn run_upload(
    client: &StoreClient,
    args: &UploadArgs,
    out: &mut impl Write,
    err: &mut impl Write,
) -> anyhow::Result<u8> {
    let outcome = client
        .upload_files(&args.files)
        .await
        .context("uploading files")?;
    report_upload(&outcome, out, err)
}

fn report_upload(
    outcome: &UploadOutcome,
    out: &mut impl Write,
    err: &mut impl Write,
) -> anyhow::Result<u8> {
    let failures = outcome.failures();
    if failures.is_empty() {
        writeln!(out, "Uploading files done")?;
        return Ok(0);
    }
    writeln!(err, "Below files were unsuccessful for upload")?;
    for (i, f) in failures.iter().enumerate() {
        writeln!(err, "{}. {} ({})", i + 1, f.path.display(), f.error)?;
    }
    Ok(1)
}

pub async fn run_list(
    client: &StoreClient,
    out: &mut impl Write,
) -> anyhow::Result<u8> {
    let names = client.list().await.context("listing files")?;
    write_numbered(&names, out)?;
    Ok(0)
}

pub async fn run_remove(
    client: &StoreClient,
    args: &RemoveArgs,
    out: &mut impl Write,
    err: &mut impl Write,
) -> anyhow::Result<u8> {
    let failed = client
        .delete(&args.names)
        .await
        .context("deleting files")?;
    report_remove(&failed, out, err)
}

fn report_remove(
    failed: &[FileNameErrorPair],
    out: &mut impl Write,
    err: &mut impl Write,
) -> anyhow::Result<u8> {
    if failed.is_empty() {
        writeln!(out, "Deleting files done")?;
        return Ok(0);
    }
    writeln!(err, "Below files were unsuccessful for deletion")?;
    for (i, pair) in failed.iter().enumerate() {
        writeln!(err, "{}. {} ({})", i + 1, pair.file_name, pair.error_msg)?;
    }
    Ok(1)
}

fn write_numbered(items: &[String], out: &mut impl Write) -> std::io::Result<()> {
    for (i, item) in items.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, item)?;
    }
    Ok(())
}
