use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};

/// Drain both streams concurrently into one buffer, line by line, in the
/// order lines arrive. Returns once both streams hit EOF or error.
pub(crate) async fn read_merged<A, B>(stdout: Option<A>, stderr: Option<B>) -> String
where
    A: AsyncRead + Unpin,
    B: AsyncRead + Unpin,
{
    let mut out_open = stdout.is_some();
    let mut err_open = stderr.is_some();
    let mut out = stdout.map(BufReader::new);
    let mut err = stderr.map(BufReader::new);
    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();
    let mut merged = Vec::new();

    while out_open || err_open {
        tokio::select! {
            res = next_line(&mut out, &mut out_buf), if out_open => {
                out_open = take_line(res, &mut out_buf, &mut merged);
            }
            res = next_line(&mut err, &mut err_buf), if err_open => {
                err_open = take_line(res, &mut err_buf, &mut merged);
            }
        }
    }

    String::from_utf8_lossy(&merged).into_owned()
}

// Partial reads stay in `buf` if the other branch wins, so nothing is lost.
async fn next_line<R>(reader: &mut Option<R>, buf: &mut Vec<u8>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    match reader {
        Some(r) => r.read_until(b'\n', buf).await,
        None => Ok(0),
    }
}

/// Move a finished line into `merged`; false once the stream is exhausted.
fn take_line(res: std::io::Result<usize>, buf: &mut Vec<u8>, merged: &mut Vec<u8>) -> bool {
    let open = matches!(res, Ok(n) if n > 0);
    merged.append(buf);
    open
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn merges_both_streams() {
        let out: &[u8] = b"one\ntwo\n";
        let err: &[u8] = b"warn\n";
        let merged = read_merged(Some(out), Some(err)).await;
        let mut lines: Vec<&str> = merged.lines().collect();
        lines.sort_unstable();
        assert_eq!(lines, vec!["one", "two", "warn"]);
        // per-stream order is preserved
        assert!(merged.find("one").unwrap() < merged.find("two").unwrap());
    }

    #[tokio::test]
    async fn keeps_unterminated_last_line_and_handles_missing_stream() {
        let out: &[u8] = b"no newline";
        let merged = read_merged::<_, &[u8]>(Some(out), None).await;
        assert_eq!(merged, "no newline");
    }

    #[tokio::test]
    async fn replaces_invalid_utf8() {
        let out: &[u8] = b"ok \xff\n";
        let merged = read_merged::<_, &[u8]>(Some(out), None).await;
        assert_eq!(merged, "ok \u{fffd}\n");
    }
}
