//! Install script stderr: logged line by line, tail kept for failures.

use std::collections::VecDeque;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// Number of trailing stderr lines carried in exec errors.
pub(crate) const TAIL_LINES: usize = 20;

/// Longest stderr line kept in memory; the rest of the line is discarded.
pub(crate) const MAX_LINE_BYTES: usize = 8 * 1024;

const TRUNCATED_MARKER: &str = " [truncated]";

/// Read `stderr` until EOF, logging each line at warn.
///
/// Lines longer than [`MAX_LINE_BYTES`] are cut and marked `[truncated]`.
///
/// # Returns
/// The last [`TAIL_LINES`] lines, oldest first
pub(crate) async fn drain<R>(stderr: R) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut tail = VecDeque::with_capacity(TAIL_LINES);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut buf)
            .await;

        match read {
            Ok(0) => break,
            Ok(_) => {
                let mut line = strip_ansi_codes(String::from_utf8_lossy(&buf).trim_end());
                if buf.len() == MAX_LINE_BYTES && buf.last() != Some(&b'\n') {
                    if let Err(e) = skip_line(&mut reader).await {
                        tracing::error!(stream = "stderr", "Failed to read from pipe: {}", e);
                        break;
                    }
                    line.push_str(TRUNCATED_MARKER);
                }
                tracing::warn!(stream = "stderr", "{}", line);

                if tail.len() == TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Err(e) => {
                tracing::error!(stream = "stderr", "Failed to read from pipe: {}", e);
                break;
            }
        }
    }

    tail.into()
}

/// Discard input up to and including the next newline, or to EOF.
async fn skip_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(newline) => {
                reader.consume(newline + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

/// Strip `ESC [ ... m` color sequences.
fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.next() == Some('[') {
                for next_char in chars.by_ref() {
                    if next_char == 'm' {
                        break;
                    }
                }
            }
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_keeps_last_lines() {
        let input: String = (0..TAIL_LINES + 5).map(|i| format!("line {i}\n")).collect();

        let tail = drain(input.as_bytes()).await;

        assert_eq!(tail.len(), TAIL_LINES);
        assert_eq!(tail.first().map(String::as_str), Some("line 5"));
        assert_eq!(
            tail.last().map(String::as_str),
            Some(format!("line {}", TAIL_LINES + 4).as_str())
        );
    }

    #[tokio::test]
    async fn test_drain_handles_missing_trailing_newline_and_bad_utf8() {
        let tail = drain(&b"first\n\xffsecond"[..]).await;
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0], "first");
        assert!(tail[1].ends_with("second"));
    }

    #[tokio::test]
    async fn test_drain_caps_long_lines() {
        let mut input = vec![b'x'; 100 * 1024];
        input.extend_from_slice(b"\nnext\n");

        let tail = drain(input.as_slice()).await;

        assert_eq!(tail.len(), 2);
        assert!(tail[0].len() <= MAX_LINE_BYTES + TRUNCATED_MARKER.len());
        assert!(tail[0].ends_with("[truncated]"));
        assert_eq!(tail[1], "next");
    }

    #[tokio::test]
    async fn test_drain_caps_unterminated_line() {
        let input = vec![b'y'; 3 * MAX_LINE_BYTES];

        let tail = drain(input.as_slice()).await;

        assert_eq!(tail.len(), 1);
        assert!(tail[0].starts_with('y'));
        assert!(tail[0].ends_with("[truncated]"));
    }

    #[tokio::test]
    async fn test_drain_keeps_line_at_exact_cap() {
        let mut input = vec![b'z'; MAX_LINE_BYTES - 1];
        input.push(b'\n');

        let tail = drain(input.as_slice()).await;

        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].len(), MAX_LINE_BYTES - 1);
        assert!(!tail[0].ends_with("[truncated]"));
    }

    #[test]
    fn test_strip_ansi_codes() {
        assert_eq!(strip_ansi_codes("\x1b[31m[ERROR]\x1b[0m boom"), "[ERROR] boom");
        assert_eq!(strip_ansi_codes("plain"), "plain");
    }
}
