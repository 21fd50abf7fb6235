//! Crash-atomic file persistence helpers shared by `TalkStore`.
//!
//! Every durable write is temp-file-then-rename: the rename is the commit
//! point, so a crash mid-write never corrupts the prior state. Grounded in
//! the teacher's `cratos-tools::builtins::config_manager::save()`, adapted
//! to `tokio::fs` since every other I/O path in this crate is async.

use std::path::Path;
use tracing::warn;

use super::TalkStoreError;

/// Write `contents` to `path` atomically: write to `path.tmp`, fsync is left
/// to the OS page cache (matching the teacher, which does not call
/// `File::sync_all` either), then rename over `path`.
pub async fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), TalkStoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension(tmp_extension(path));
    tokio::fs::write(&tmp_path, contents).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

fn tmp_extension(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.tmp"),
        None => "tmp".to_string(),
    }
}

/// Append a single line (without trailing newline) to a JSONL file,
/// creating it if absent.
pub async fn append_line(path: &Path, line: &str) -> Result<(), TalkStoreError> {
    use tokio::io::AsyncWriteExt;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    Ok(())
}

/// Parse every line of a JSONL file into `T`, skipping (and warning on)
/// lines that fail to parse. Missing files return an empty vector.
pub async fn read_jsonl_all<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Vec<T>, TalkStoreError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(parse_lines(&contents, path))
}

fn parse_lines<T: serde::de::DeserializeOwned>(contents: &str, path: &Path) -> Vec<T> {
    let mut out = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(v) => out.push(v),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping corrupt JSONL line"),
        }
    }
    out
}

/// Read the last `n` entries of a JSONL file.
///
/// Files under 64 KiB are loaded whole then sliced. Larger files are read
/// backward in 16 KiB chunks, parsed in reverse, with a carry buffer for a
/// partial first line, stopping once `n` entries are collected (§4.1
/// "Message-log access discipline").
pub async fn read_jsonl_tail<T: serde::de::DeserializeOwned>(
    path: &Path,
    n: usize,
) -> Result<Vec<T>, TalkStoreError> {
    const SMALL_FILE_THRESHOLD: u64 = 64 * 1024;
    const CHUNK_SIZE: u64 = 16 * 1024;

    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    if metadata.len() < SMALL_FILE_THRESHOLD {
        let all: Vec<T> = read_jsonl_all(path).await?;
        let start = all.len().saturating_sub(n);
        return Ok(all.into_iter().skip(start).collect());
    }

    use tokio::io::{AsyncReadExt, AsyncSeekExt};
    let mut file = tokio::fs::File::open(path).await?;
    let file_len = metadata.len();

    let mut collected_lines: Vec<String> = Vec::new();
    let mut carry = String::new();
    let mut pos = file_len;

    while pos > 0 && collected_lines.len() < n {
        let chunk_start = pos.saturating_sub(CHUNK_SIZE);
        let read_len = (pos - chunk_start) as usize;
        file.seek(std::io::SeekFrom::Start(chunk_start)).await?;
        let mut buf = vec![0u8; read_len];
        file.read_exact(&mut buf).await?;
        pos = chunk_start;

        let chunk_str = String::from_utf8_lossy(&buf);
        let mut combined = chunk_str.into_owned();
        combined.push_str(&carry);

        let mut lines: Vec<&str> = combined.split('\n').collect();
        // The first element may be a partial line unless we're at the start
        // of the file; carry it into the next (earlier) chunk.
        carry = if chunk_start > 0 {
            lines.remove(0).to_string()
        } else {
            String::new()
        };

        for line in lines.into_iter().rev() {
            let line = line.trim();
            if !line.is_empty() {
                collected_lines.push(line.to_string());
            }
            if collected_lines.len() >= n {
                break;
            }
        }
    }
    if !carry.trim().is_empty() && collected_lines.len() < n {
        collected_lines.push(carry.trim().to_string());
    }

    collected_lines.reverse();
    let mut out = Vec::with_capacity(collected_lines.len());
    for line in collected_lines {
        match serde_json::from_str::<T>(&line) {
            Ok(v) => out.push(v),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping corrupt JSONL line"),
        }
    }
    Ok(out)
}

/// Rewrite a JSONL file from scratch (used by `deleteMessages`).
pub async fn rewrite_jsonl<T: serde::Serialize>(
    path: &Path,
    items: &[T],
) -> Result<(), TalkStoreError> {
    let mut buf = String::new();
    for item in items {
        buf.push_str(&serde_json::to_string(item)?);
        buf.push('\n');
    }
    atomic_write(path, buf.as_bytes()).await
}
