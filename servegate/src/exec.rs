use std::io::Read;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("spawn {script}: {source}")]
    Spawn {
        script: String,
        #[source]
        source: std::io::Error,
    },

    #[error("output pipe for {script}: {source}")]
    Pipe {
        script: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stdin of {0} not available")]
    Stdin(String),

    #[error("wait for {script}: {source}")]
    Wait {
        script: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{script} exited with {status}")]
    Status { script: String, status: ExitStatus },

    #[error("{script} did not finish within {timeout:?}")]
    Timeout { script: String, timeout: Duration },
}

/// Runs a verification script with the raw request on stdin and returns
/// whatever it printed on stdout and stderr, interleaved as written.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, script: &Path, stdin: Bytes) -> Result<String, ExecError>;
}

/// Runs scripts as child processes on the tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner {
    timeout: Option<Duration>,
}

impl TokioProcessRunner {
    /// No timeout: a hung script holds the request until it exits.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, script: &Path, stdin: Bytes) -> Result<String, ExecError> {
        let name = script.display().to_string();

        // One pipe behind both stdout and stderr, so output reads back in
        // the order the script wrote it.
        let (mut reader, writer) =
            std::io::pipe().map_err(|source| ExecError::Pipe { script: name.clone(), source })?;
        let err_writer = writer
            .try_clone()
            .map_err(|source| ExecError::Pipe { script: name.clone(), source })?;

        // The command holds the parent's copies of the write end; it must be
        // dropped before reading or EOF never arrives.
        let mut child = {
            let mut cmd = Command::new(script);
            cmd.stdin(Stdio::piped())
                .stdout(writer)
                .stderr(err_writer)
                .kill_on_drop(true);
            cmd.spawn()
                .map_err(|source| ExecError::Spawn { script: name.clone(), source })?
        };

        let mut pipe = child.stdin.take().ok_or_else(|| ExecError::Stdin(name.clone()))?;

        // Write errors are ignored: a script may exit or close stdin early
        // and still have produced its verdict.
        tokio::spawn(async move {
            let _ = pipe.write_all(&stdin).await;
            let _ = pipe.shutdown().await;
        });

        let output = tokio::task::spawn_blocking(move || {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).map(|_| buf)
        });

        let finished = async {
            let buf = output
                .await
                .map_err(std::io::Error::other)
                .and_then(|r| r)
                .map_err(|source| ExecError::Wait { script: name.clone(), source })?;
            let status = child
                .wait()
                .await
                .map_err(|source| ExecError::Wait { script: name.clone(), source })?;
            Ok::<_, ExecError>((status, buf))
        };

        let (status, buf) = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, finished)
                .await
                .map_err(|_| ExecError::Timeout { script: name.clone(), timeout })??,
            None => finished.await?,
        };

        if !status.success() {
            return Err(ExecError::Status { script: name, status });
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Strip exactly one trailing newline from script output.
pub fn trim_one_newline(out: &str) -> &str {
    out.strip_suffix('\n').unwrap_or(out)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let p = dir.path().join(name);
        std::fs::write(&p, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&p, std::fs::Permissions::from_mode(0o755)).unwrap();
        p
    }

    #[test]
    fn trims_only_one_newline() {
        assert_eq!(trim_one_newline("ok\n"), "ok");
        assert_eq!(trim_one_newline("ok\n\n"), "ok\n");
        assert_eq!(trim_one_newline("ok"), "ok");
        assert_eq!(trim_one_newline("ok\r\n"), "ok\r");
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let dir = TempDir::new().unwrap();
        let p = script(&dir, "both.sh", "printf out; printf err >&2");
        let out = TokioProcessRunner::new().run(&p, Bytes::new()).await.unwrap();
        assert_eq!(out, "outerr");
    }

    #[tokio::test]
    async fn output_keeps_write_order_across_streams() {
        let dir = TempDir::new().unwrap();
        let p = script(&dir, "order.sh", "printf 1 >&2; printf 2; printf 3 >&2; printf 4");
        let out = TokioProcessRunner::new().run(&p, Bytes::new()).await.unwrap();
        assert_eq!(out, "1234");
    }

    #[tokio::test]
    async fn feeds_request_on_stdin() {
        let dir = TempDir::new().unwrap();
        let p = script(&dir, "cat.sh", "head -n 1");
        let out = TokioProcessRunner::new()
            .run(&p, Bytes::from_static(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n"))
            .await
            .unwrap();
        assert_eq!(out, "GET / HTTP/1.1\r\n");
    }

    #[tokio::test]
    async fn ignores_unread_stdin() {
        let dir = TempDir::new().unwrap();
        let p = script(&dir, "noread.sh", "echo ok");
        let big = Bytes::from(vec![b'a'; 1 << 20]);
        let out = TokioProcessRunner::new().run(&p, big).await.unwrap();
        assert_eq!(out, "ok\n");
    }

    #[tokio::test]
    async fn non_zero_exit_is_error() {
        let dir = TempDir::new().unwrap();
        let p = script(&dir, "fail.sh", "echo ok; exit 3");
        let err = TokioProcessRunner::new().run(&p, Bytes::new()).await.unwrap_err();
        assert!(matches!(err, ExecError::Status { .. }));
    }

    #[tokio::test]
    async fn missing_script_is_spawn_error() {
        let err = TokioProcessRunner::new()
            .run(Path::new("/nonexistent/servegate-check"), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[tokio::test]
    async fn timeout_kills_hung_script() {
        let dir = TempDir::new().unwrap();
        let p = script(&dir, "hang.sh", "exec sleep 5");
        let runner = TokioProcessRunner::with_timeout(Some(Duration::from_millis(100)));
        let err = runner.run(&p, Bytes::new()).await.unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
    }
}
