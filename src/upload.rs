//! Upload staging (spec §4.9 "Streaming discipline"): streams an incoming
//! file to a temp path in bounded chunks, enforcing the configured max size
//! before a byte of it is parsed. This is the one piece of the (out-of-scope)
//! HTTP upload surface the core itself needs, since `queue_import` requires
//! a path on disk already written by the time a job is enqueued.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{CoreError, CoreResult};

/// Bytes read per chunk while staging an upload (spec §4.9: "≤1 MiB
/// chunks").
const CHUNK_SIZE: usize = 1024 * 1024;

/// Copies `source` into a fresh temp file, rejecting anything past
/// `max_size_bytes` with `ResourceExhausted` rather than buffering the
/// whole thing in memory first.
pub async fn stage_upload<R>(mut source: R, max_size_bytes: u64) -> CoreResult<tempfile::NamedTempFile>
where
    R: AsyncRead + Unpin,
{
    let file = tempfile::NamedTempFile::new()?;
    let mut out = tokio::fs::File::create(file.path()).await?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = source.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        total += n as u64;
        if total > max_size_bytes {
            return Err(CoreError::ResourceExhausted(format!(
                "upload exceeds max_upload_size_bytes ({max_size_bytes})"
            )));
        }
        tokio::io::AsyncWriteExt::write_all(&mut out, &buf[..n]).await?;
    }
    tokio::io::AsyncWriteExt::flush(&mut out).await?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stages_small_upload() {
        let data = b"id,name\n1,a\n2,b\n";
        let file = stage_upload(&data[..], 1024).await.unwrap();
        let contents = tokio::fs::read(file.path()).await.unwrap();
        assert_eq!(contents, data);
    }

    #[tokio::test]
    async fn rejects_oversized_upload() {
        let data = vec![0u8; 2048];
        let result = stage_upload(&data[..], 1024).await;
        assert!(result.is_err());
    }
}
