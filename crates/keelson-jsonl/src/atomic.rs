//! Atomic write operations for JSONL files.
//!
//! This module provides functionality for atomically writing JSONL data to files,
//! ensuring crash safety by using the temp-file-then-rename pattern.
//!
//! # Atomicity Guarantee
//!
//! On POSIX systems, file renames within the same filesystem are atomic operations.
//! This module exploits this property to provide crash-safe writes:
//!
//! 1. Data is first written to a temporary file with a `.tmp` extension
//! 2. The temporary file is flushed and closed
//! 3. The temporary file is atomically renamed to the target path
//!
//! If a crash occurs during step 1 or 2, the original file remains intact.
//! The temporary file may be left behind, but data integrity is preserved.
//!
//! # Examples
//!
//! ```no_run
//! use keelson_jsonl::write_jsonl_atomic;
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Record {
//!     id: u32,
//!     name: String,
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let records = vec![
//!     Record { id: 1, name: "Alice".to_string() },
//!     Record { id: 2, name: "Bob".to_string() },
//! ];
//!
//! // Atomically write records to file
//! write_jsonl_atomic("data.jsonl", &records).await?;
//! # Ok(())
//! # }
//! ```

use crate::{JsonlWriter, Result};
use serde::Serialize;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Atomically writes a slice of values to a JSONL file.
///
/// This function provides crash-safe writing by first writing all data to a
/// temporary file, then atomically renaming it to the target path. This ensures
/// that the target file is never left in a partially-written state.
///
/// # Arguments
///
/// * `path` - The target file path. A temporary file with `.tmp` extension will
///   be created alongside it during the write operation.
/// * `values` - A slice of values to serialize and write. Each value is written
///   as a separate JSON line.
///
/// # Errors
///
/// Returns an error if:
/// - The temporary file cannot be created
/// - Any value fails to serialize
/// - An I/O error occurs during writing
/// - The atomic rename fails (e.g., cross-filesystem move)
///
/// # Atomicity
///
/// On failure, the original file (if it exists) is left unchanged. The temporary
/// file may be left behind and should be cleaned up by the caller or a subsequent
/// successful write.
///
/// # Examples
///
/// ```no_run
/// use keelson_jsonl::write_jsonl_atomic;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Issue {
///     id: String,
///     title: String,
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let issues = vec![
///     Issue { id: "PROJ-1".to_string(), title: "First issue".to_string() },
///     Issue { id: "PROJ-2".to_string(), title: "Second issue".to_string() },
/// ];
///
/// // This write is atomic - either all issues are written or none
/// write_jsonl_atomic("issues.jsonl", &issues).await?;
/// # Ok(())
/// # }
/// ```
pub async fn write_jsonl_atomic<T, P>(path: P, values: &[T]) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    write_jsonl_atomic_iter(path, values.iter()).await
}

/// Atomically writes an iterator of values to a JSONL file.
///
/// This is a more flexible version of [`write_jsonl_atomic`] that accepts any
/// iterator of serializable values. Useful when you want to avoid collecting
/// values into a slice first.
///
/// # Arguments
///
/// * `path` - The target file path.
/// * `values` - An iterator of values to serialize and write.
///
/// # Errors
///
/// See [`write_jsonl_atomic`] for error conditions.
///
/// # Examples
///
/// ```no_run
/// use keelson_jsonl::write_jsonl_atomic_iter;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Record { id: u32 }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// // Write records without collecting into a Vec first
/// let records = (0..1000).map(|id| Record { id });
/// write_jsonl_atomic_iter("records.jsonl", records).await?;
/// # Ok(())
/// # }
/// ```
pub async fn write_jsonl_atomic_iter<T, I, P>(path: P, values: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let temp_path = make_temp_path(path);

    // Write to temporary file
    let write_result = write_to_temp_file(&temp_path, values).await;

    // Handle write failure: attempt to clean up temp file
    if let Err(e) = write_result {
        // Best-effort cleanup of temp file
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    // Atomic rename to target path
    tokio::fs::rename(&temp_path, path).await?;

    Ok(())
}

/// Atomically writes a single byte buffer to a file.
///
/// Unlike [`write_jsonl_atomic`], this does not assume a line-oriented format:
/// the bytes are written verbatim. Used for single-document artifacts such as
/// a sync-state index or a rendered Markdown file, where the same temp-file-
/// then-rename guarantee is wanted but there is no per-line record structure.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created or written, or if
/// the atomic rename fails.
pub async fn write_bytes_atomic<P>(path: P, contents: &[u8]) -> Result<()>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let temp_path = make_temp_path(path);

    let write_result = async {
        let mut file = File::create(&temp_path).await?;
        file.write_all(contents).await?;
        file.flush().await?;
        Ok::<_, crate::Error>(())
    }
    .await;

    if let Err(e) = write_result {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

/// Creates a temporary file path for atomic write operations.
///
/// The temp path is created by appending `.tmp` to the original filename.
/// If the original path has no extension, `.tmp` is appended directly.
/// If it has an extension, the extension is replaced with `{ext}.tmp`.
fn make_temp_path(path: &Path) -> std::path::PathBuf {
    let mut temp_path = path.to_path_buf();
    let new_extension = match path.extension() {
        Some(ext) => {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".tmp");
            new_ext
        }
        None => std::ffi::OsString::from("tmp"),
    };
    temp_path.set_extension(new_extension);
    temp_path
}

/// Writes values to a temporary file, ensuring proper flush and close.
async fn write_to_temp_file<T, I>(temp_path: &Path, values: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let file = File::create(temp_path).await?;
    let mut writer = JsonlWriter::new(file);
    writer.write_all(values).await?;
    writer.flush().await?;
    Ok(())
}
