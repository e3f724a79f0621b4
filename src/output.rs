//! Purpose: Persist job results and failure records as pretty JSON files.
//! Exports: `save_json`, `save_error`, `error_file_name`.
//! Role: On-disk side of the CLI; the orchestrator never touches the filesystem.
//! Invariants: Files are 2-space indented UTF-8 JSON; non-ASCII text is written verbatim.
//! Invariants: Result files are overwritten per operation; error files are timestamped.
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;

use fbscrape::api::{Error, ErrorKind, JobFailure};

const TIMESTAMP_FORMAT: &str = "[year][month][day]-[hour][minute][second]";

pub(crate) fn save_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<PathBuf, Error> {
    let path = dir.join(format!("{name}.json"));
    write_pretty(&path, value)?;
    Ok(path)
}

pub(crate) fn save_error(dir: &Path, name: &str, failure: &JobFailure) -> Result<PathBuf, Error> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let path = dir.join(error_file_name(name, now)?);
    write_pretty(&path, failure)?;
    Ok(path)
}

pub(crate) fn error_file_name(name: &str, at: OffsetDateTime) -> Result<String, Error> {
    let format: Vec<BorrowedFormatItem<'_>> = time::format_description::parse(TIMESTAMP_FORMAT)
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("invalid timestamp format")
                .with_source(err)
        })?;
    let stamp = at.format(format.as_slice()).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to format timestamp")
            .with_source(err)
    })?;
    Ok(format!("error_{name}_{stamp}.json"))
}

fn write_pretty<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to create output directory {}", parent.display()))
                .with_source(err)
        })?;
    }
    let bytes = serde_json::to_vec_pretty(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode json")
            .with_source(err)
    })?;
    std::fs::write(path, bytes).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to write {}", path.display()))
            .with_source(err)
    })
}
