//! Fetching theme sources from remote repositories.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{ThemeError, ThemeResult};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Retrieves a repository reference into a local directory.
pub trait RemoteFetcher: Send + Sync {
    /// `dest` must not exist yet or be empty.
    fn fetch(&self, url: &str, dest: &Path) -> ThemeResult<()>;
}

/// Expands shorthand references to clone URLs.
///
/// `owner/repo` becomes `https://github.com/owner/repo.git`, a scheme-less
/// `github.com/owner/repo` gains `https://`. Anything else is passed through.
pub fn resolve_reference(reference: &str) -> String {
    let reference = reference.trim().trim_end_matches('/');

    if reference.contains("://") || reference.starts_with("git@") {
        return reference.to_string();
    }
    if reference.starts_with("github.com/") {
        return format!("https://{reference}");
    }

    let mut parts = reference.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None)
            if !owner.is_empty()
                && !repo.is_empty()
                && !reference.contains(char::is_whitespace) =>
        {
            format!(
                "https://github.com/{owner}/{}.git",
                repo.trim_end_matches(".git")
            )
        }
        _ => reference.to_string(),
    }
}

/// Shallow `git clone` bounded by a timeout.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    program: String,
    timeout: Duration,
}

impl GitFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self::with_program("git", timeout)
    }

    /// Uses `program` instead of the `git` found on `PATH`.
    pub fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl RemoteFetcher for GitFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> ThemeResult<()> {
        let failed = |reason: String| ThemeError::FetchFailed {
            reference: url.to_string(),
            reason,
        };

        log::info!("Cloning {url} into {}", dest.display());
        let mut child = Command::new(&self.program)
            .arg("clone")
            .arg("--quiet")
            .arg("--depth")
            .arg("1")
            .arg(url)
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failed(format!("Failed to run {}: {e}", self.program)))?;

        // git blocks once the stderr pipe is full, so read it while polling
        let stderr = child.stderr.take();
        let drain = thread::spawn(move || {
            let mut output = Vec::new();
            if let Some(mut pipe) = stderr {
                let _ = pipe.read_to_end(&mut output);
            }
            String::from_utf8_lossy(&output).into_owned()
        });

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    // Helpers git spawned may still hold the pipe open
                    drop(drain);
                    return Err(failed(format!(
                        "timed out after {}s",
                        self.timeout.as_secs()
                    )));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(failed(format!("Failed to wait for clone: {e}")));
                }
            }
        };

        let stderr = drain.join().unwrap_or_default();
        if !status.success() {
            return Err(failed(format!("git clone failed: {}", stderr.trim())));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_reference() {
        assert_eq!(
            resolve_reference("acme/midnight"),
            "https://github.com/acme/midnight.git"
        );
        assert_eq!(
            resolve_reference("acme/midnight.git"),
            "https://github.com/acme/midnight.git"
        );
        assert_eq!(
            resolve_reference("github.com/acme/midnight"),
            "https://github.com/acme/midnight"
        );
        assert_eq!(
            resolve_reference("https://gitlab.com/acme/midnight.git"),
            "https://gitlab.com/acme/midnight.git"
        );
        assert_eq!(
            resolve_reference("git@github.com:acme/midnight.git"),
            "git@github.com:acme/midnight.git"
        );
        assert_eq!(resolve_reference("a/b/c"), "a/b/c");
    }

    #[test]
    fn test_missing_program_is_fetch_failure() {
        let tmp = TempDir::new().unwrap();
        let fetcher = GitFetcher::with_program(
            "themectl-nonexistent-git-binary",
            Duration::from_secs(1),
        );
        assert_matches!(
            fetcher.fetch("https://example.invalid/repo.git", &tmp.path().join("dest")),
            Err(ThemeError::FetchFailed { .. })
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_large_stderr_does_not_stall_clone() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let script = tmp.path().join("noisy-git");
        std::fs::write(
            &script,
            "#!/bin/sh\nhead -c 300000 /dev/zero | tr '\\0' 'x' >&2\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let fetcher = GitFetcher::with_program(script.to_string_lossy(), Duration::from_secs(5));
        let started = Instant::now();
        let result = fetcher.fetch("https://example.invalid/repo.git", &tmp.path().join("dest"));

        match result {
            Err(ThemeError::FetchFailed { reason, .. }) => {
                assert!(reason.starts_with("git clone failed: xxx"));
                assert!(reason.len() > 300_000);
            }
            other => panic!("expected fetch failure, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
