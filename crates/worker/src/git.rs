//! Clone and delete actions backed by the `git` command line.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info};

use repoflow_core::config::GitConfig;
use repoflow_core::{repository_path, CloneProgress, Repository};

use crate::actions::{CloneResult, Cloner, Remover};
use crate::context::ProgressReporter;
use crate::error::WorkerError;

/// Stderr lines kept for error messages.
const STDERR_TAIL: usize = 8;
/// Share of overall progress given to receiving objects; resolving deltas
/// covers the rest.
const RECEIVE_SHARE: u32 = 80;
/// Highest progress reported while git is still running.
const MAX_INTERMEDIATE: u8 = 99;

pub struct GitCli {
    binary: String,
}

impl GitCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_config(config: &GitConfig) -> Self {
        Self::new(config.binary.clone())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    /// Run git with progress on stderr, relaying it to `reporter`.
    async fn run_with_progress(
        &self,
        args: &[&OsStr],
        reporter: &ProgressReporter,
        detail: &mut CloneProgress,
    ) -> Result<(), WorkerError> {
        let mut child = self
            .command()
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut tail = VecDeque::with_capacity(STDERR_TAIL);
        if let Some(stderr) = child.stderr.take() {
            let mut lines = ProgressLines::new(stderr);
            while let Some(line) = lines.next_line().await? {
                if let Some(progress) = parse_progress_line(&line, detail) {
                    reporter.report(progress, Some(detail.clone())).await;
                }
                if tail.len() == STDERR_TAIL {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let stderr: Vec<String> = tail.into_iter().collect();
            return Err(WorkerError::action(
                "git",
                format!("{status}: {}", stderr.join(" | ")),
            ));
        }
        Ok(())
    }

    /// Run git and return trimmed stdout.
    async fn output(&self, dir: &Path, args: &[&str]) -> Result<String, WorkerError> {
        let out = self
            .command()
            .arg("-C")
            .arg(dir)
            .args(args)
            .output()
            .await?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(WorkerError::action(
                "git",
                format!("git {} failed: {}", args.join(" "), stderr.trim()),
            ));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    /// Commit currently checked out at `checkout`.
    pub async fn head_revision(&self, checkout: &Path) -> Result<String, WorkerError> {
        self.output(checkout, &["rev-parse", "HEAD"]).await
    }
}

#[async_trait]
impl Cloner for GitCli {
    async fn clone_repository(
        &self,
        repo: &Repository,
        data_path: &Path,
        reporter: &ProgressReporter,
    ) -> Result<CloneResult, WorkerError> {
        let target = repository_path(data_path, &repo.uri)?;
        let mut detail = CloneProgress::default();

        if target.join(".git").is_dir() {
            info!(uri = %repo.uri, path = %target.display(), "Checkout exists, fetching");
            let args = [
                OsStr::new("-C"),
                target.as_os_str(),
                OsStr::new("fetch"),
                OsStr::new("--progress"),
                OsStr::new("origin"),
            ];
            self.run_with_progress(&args, reporter, &mut detail).await?;
            self.output(&target, &["reset", "--hard", "FETCH_HEAD"]).await?;
        } else {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            // A leftover directory without .git is from an interrupted clone.
            if target.exists() {
                debug!(path = %target.display(), "Removing partial checkout");
                tokio::fs::remove_dir_all(&target).await?;
            }
            let args = [
                OsStr::new("clone"),
                OsStr::new("--progress"),
                OsStr::new(&repo.url),
                target.as_os_str(),
            ];
            self.run_with_progress(&args, reporter, &mut detail).await?;
        }

        let revision = self.head_revision(&target).await?;
        detail.is_cloned = true;
        Ok(CloneResult {
            uri: repo.uri.clone(),
            revision,
            detail: Some(detail),
        })
    }
}

#[async_trait]
impl Remover for GitCli {
    async fn remove(&self, uri: &str, data_path: &Path) -> Result<(), WorkerError> {
        let target: PathBuf = repository_path(data_path, uri)?;
        match tokio::fs::remove_dir_all(&target).await {
            Ok(()) => {
                info!(uri, path = %target.display(), "Checkout removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(uri, path = %target.display(), "Checkout already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Splits a progress stream on `\r` as well as `\n`, since git redraws its
/// progress lines in place.
struct ProgressLines<R> {
    reader: R,
    pending: Vec<u8>,
    done: bool,
}

impl<R: AsyncRead + Unpin> ProgressLines<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::new(),
            done: false,
        }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            if let Some(pos) = self.pending.iter().position(|b| *b == b'\r' || *b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&line[..pos]).trim().to_string();
                if text.is_empty() {
                    continue;
                }
                return Ok(Some(text));
            }
            if self.done {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                let text = String::from_utf8_lossy(&self.pending).trim().to_string();
                self.pending.clear();
                return Ok((!text.is_empty()).then_some(text));
            }
            let mut buf = [0u8; 4096];
            let n = self.reader.read(&mut buf).await?;
            if n == 0 {
                self.done = true;
            } else {
                self.pending.extend_from_slice(&buf[..n]);
            }
        }
    }
}

/// Update `detail` from one line of `git clone --progress` output and return
/// the overall percentage, if the line carried progress.
fn parse_progress_line(line: &str, detail: &mut CloneProgress) -> Option<u8> {
    let line = line.strip_prefix("remote: ").unwrap_or(line);

    if let Some(rest) = line.strip_prefix("Receiving objects:") {
        let (pct, done, total) = parse_counts(rest)?;
        detail.received_objects = done;
        detail.total_objects = total;
        if let Some(bytes) = parse_transferred(rest) {
            detail.received_bytes = bytes;
        }
        return Some(overall(pct * RECEIVE_SHARE / 100));
    }
    if let Some(rest) = line.strip_prefix("Resolving deltas:") {
        let (pct, done, total) = parse_counts(rest)?;
        detail.indexed_deltas = done;
        detail.total_deltas = total;
        return Some(overall(RECEIVE_SHARE + pct * (100 - RECEIVE_SHARE) / 100));
    }
    if let Some(rest) = line.strip_prefix("Indexing objects:") {
        let (_, done, _) = parse_counts(rest)?;
        detail.indexed_objects = done;
    }
    None
}

fn overall(pct: u32) -> u8 {
    pct.min(MAX_INTERMEDIATE as u32) as u8
}

/// `"  45% (450/1000), ..."` → `(45, 450, 1000)`
fn parse_counts(rest: &str) -> Option<(u32, u64, u64)> {
    let rest = rest.trim_start();
    let (pct, rest) = rest.split_once('%')?;
    let pct: u32 = pct.trim().parse().ok()?;
    let open = rest.find('(')?;
    let close = rest[open..].find(')')? + open;
    let (done, total) = rest[open + 1..close].split_once('/')?;
    Some((pct.min(100), done.trim().parse().ok()?, total.trim().parse().ok()?))
}

/// `"... (450/1000), 1.20 MiB | 2.00 MiB/s"` → bytes received so far.
fn parse_transferred(rest: &str) -> Option<u64> {
    let (_, after) = rest.split_once("),")?;
    let amount = after.split('|').next()?.trim();
    let (value, unit) = amount.split_once(' ')?;
    let value: f64 = value.parse().ok()?;
    let scale = match unit.trim_end_matches(',').trim() {
        "bytes" => 1.0,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some((value * scale) as u64)
}
