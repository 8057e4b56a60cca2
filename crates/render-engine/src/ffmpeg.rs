//! Shared plumbing for the ffmpeg/ffprobe child processes.

use std::io::{BufReader, Read};
use std::process::{Child, ChildStderr, Command, Stdio};
use std::thread::JoinHandle;

/// Whether `binary -version` runs successfully.
pub fn is_tool_available(binary: &str) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn is_ffmpeg_on_path() -> bool {
    is_tool_available("ffmpeg")
}

pub fn is_ffprobe_on_path() -> bool {
    is_tool_available("ffprobe")
}

/// Seconds formatted for `-ss`/`-t`.
pub(crate) fn secs_arg(secs: f64) -> String {
    format!("{:.6}", secs.max(0.0))
}

/// Drains a child's stderr on a thread so a chatty process never blocks on
/// a full pipe.
pub(crate) struct StderrDrain {
    handle: Option<JoinHandle<String>>,
}

impl StderrDrain {
    pub(crate) fn spawn(stderr: ChildStderr) -> Self {
        let handle = std::thread::spawn(move || {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Everything written to stderr. Blocks until the pipe closes.
    pub(crate) fn collect(&mut self) -> String {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| "<failed to join stderr reader>".to_string()),
            None => String::new(),
        }
    }
}

/// Kill and reap a child. Errors are ignored: the process may already be gone.
pub(crate) fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Last few lines of ffmpeg output, for error messages.
pub(crate) fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim().lines().collect();
    let start = lines.len().saturating_sub(8);
    lines[start..].join("\n")
}

/// Fill `buf` from `reader`, stopping early only at EOF. Returns bytes read.
pub(crate) fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secs_arg_clamps_and_formats() {
        assert_eq!(secs_arg(2.5), "2.500000");
        assert_eq!(secs_arg(-1.0), "0.000000");
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let text = (0..20).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let tail = stderr_tail(&text);
        assert!(tail.starts_with("line 12"));
        assert!(tail.ends_with("line 19"));
    }

    #[test]
    fn test_read_full_stops_at_eof() {
        let data = [1u8, 2, 3];
        let mut buf = [0u8; 8];
        let n = read_full(&mut &data[..], &mut buf).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], &data);
    }

    #[test]
    fn test_missing_tool_is_unavailable() {
        assert!(!is_tool_available("sheen-definitely-not-a-binary"));
    }
}
