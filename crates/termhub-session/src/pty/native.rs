//! `portable-pty` backend: the production [`PtyBackend`] implementation.

use std::io::Read;
use std::path::Path;

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use super::PtyBackend;

/// Get the user's default shell.
///
/// - Unix: reads `$SHELL`, falls back to `/bin/sh`
/// - Windows: reads `$COMSPEC`, falls back to `cmd.exe`
pub fn default_shell() -> String {
    #[cfg(unix)]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }
    #[cfg(windows)]
    {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    }
}

/// Allowed environment variables to inherit.
///
/// A minimal set, so host-internal secrets (API keys, tokens) never leak
/// into session processes.
const ALLOWED_ENV_VARS: &[&str] = &[
    "HOME",
    "USER",
    "LOGNAME",
    "SHELL",
    "PATH",
    "TERM",
    "LANG",
    "LC_ALL",
    "LC_CTYPE",
    "DISPLAY",
    "WAYLAND_DISPLAY",
    "XDG_RUNTIME_DIR",
    "TMPDIR",
    "TMP",
    "TEMP",
    // Windows-specific
    "USERPROFILE",
    "APPDATA",
    "LOCALAPPDATA",
    "SYSTEMROOT",
    "COMSPEC",
    "HOMEDRIVE",
    "HOMEPATH",
];

/// Build a sanitized `CommandBuilder` for the given program.
fn build_command(program: &str, cwd: &Path, login_shell: bool) -> CommandBuilder {
    let mut cmd = CommandBuilder::new(program);

    // Clear inherited env, then selectively re-add safe vars
    cmd.env_clear();
    for key in ALLOWED_ENV_VARS {
        if let Ok(val) = std::env::var(key) {
            cmd.env(key, val);
        }
    }
    cmd.env("TERM", "xterm-256color");
    cmd.cwd(cwd);

    // On Unix, -l loads .profile / .bash_profile for plain shell sessions
    #[cfg(unix)]
    if login_shell {
        cmd.arg("-l");
    }
    #[cfg(not(unix))]
    let _ = login_shell;

    cmd
}

/// PTY-attached child process via `portable-pty`.
pub struct NativePty {
    writer: Box<dyn std::io::Write + Send>,
    reader: Option<Box<dyn Read + Send>>,
    child: Box<dyn Child + Send + Sync>,
    master: Box<dyn MasterPty + Send>,
}

impl NativePty {
    /// Open a PTY and spawn `program` attached to it.
    ///
    /// `login_shell` should be set when `program` is the user's shell rather
    /// than an explicit command. Returns the OS error text unmodified on
    /// failure.
    pub fn spawn(
        program: &str,
        cwd: &Path,
        rows: u16,
        cols: u16,
        login_shell: bool,
    ) -> Result<Self, String> {
        let pty_system = native_pty_system();

        let size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };

        let pair = pty_system
            .openpty(size)
            .map_err(|e| format!("failed to open PTY: {e}"))?;

        let cmd = build_command(program, cwd, login_shell);
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| format!("failed to spawn '{program}': {e}"))?;

        // Drop the slave side — only the master is needed from here
        drop(pair.slave);

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| format!("failed to take PTY writer: {e}"))?;
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| format!("failed to clone PTY reader: {e}"))?;

        Ok(Self {
            writer,
            reader: Some(reader),
            child,
            master: pair.master,
        })
    }
}

impl PtyBackend for NativePty {
    fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()
    }

    fn resize(&mut self, rows: u16, cols: u16) -> std::io::Result<()> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| std::io::Error::other(format!("PTY resize failed: {e}")))
    }

    fn take_reader(&mut self) -> Option<Box<dyn Read + Send>> {
        self.reader.take()
    }

    fn terminate(&mut self) {
        if let Err(e) = self.child.kill() {
            tracing::debug!("PTY kill error (may already be dead): {e}");
        }
    }

    fn wait(&mut self) -> Option<u32> {
        match self.child.wait() {
            Ok(status) => Some(status.exit_code()),
            Err(e) => {
                tracing::debug!("PTY wait error: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_shell_returns_nonempty() {
        assert!(!default_shell().is_empty());
    }

    #[test]
    fn allowed_env_vars_contains_essentials() {
        assert!(ALLOWED_ENV_VARS.contains(&"HOME"));
        assert!(ALLOWED_ENV_VARS.contains(&"PATH"));
        assert!(ALLOWED_ENV_VARS.contains(&"TERM"));
        assert!(ALLOWED_ENV_VARS.contains(&"USER"));
    }

    #[test]
    fn allowed_env_vars_excludes_secrets() {
        for var in ALLOWED_ENV_VARS {
            let lower = var.to_lowercase();
            for needle in ["key", "secret", "token", "password"] {
                assert!(
                    !lower.contains(needle),
                    "ALLOWED_ENV_VARS should not contain '{var}'"
                );
            }
        }
    }

    #[test]
    fn spawn_missing_binary_reports_os_text() {
        let Err(err) = NativePty::spawn(
            "/definitely/not/a/real/binary",
            Path::new("/"),
            24,
            80,
            false,
        ) else {
            panic!("spawn of a missing binary should fail");
        };
        assert!(err.contains("/definitely/not/a/real/binary"));
    }

    #[test]
    fn spawn_takes_reader_once() {
        let mut pty = NativePty::spawn(&default_shell(), Path::new("/"), 24, 80, true)
            .expect("spawn should succeed");
        assert!(pty.take_reader().is_some());
        assert!(pty.take_reader().is_none());
        pty.terminate();
        pty.wait();
    }

    #[test]
    fn terminate_is_idempotent() {
        let mut pty = NativePty::spawn(&default_shell(), Path::new("/"), 24, 80, true)
            .expect("spawn should succeed");
        pty.terminate();
        pty.terminate();
        pty.wait();
    }
}
