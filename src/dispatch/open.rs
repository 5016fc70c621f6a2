//! Opening files and launching applications

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::{Error, Result};

/// Hands files and application names to the desktop
#[async_trait]
pub trait FileOpener: Send + Sync {
    /// Open `path` with its default application
    ///
    /// # Errors
    ///
    /// Returns `Error::Launch` with the reason on failure
    async fn open(&self, path: &Path) -> Result<()>;

    /// Launch an application by name
    ///
    /// # Errors
    ///
    /// Returns `Error::Launch` if no such application can be started
    async fn launch(&self, app: &str) -> Result<()>;
}

/// Uses the platform launcher (`open`, `start`, `xdg-open`)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl SystemOpener {
    fn spawn(mut cmd: Command, what: &str) -> Result<()> {
        // Children are reaped by the runtime once they exit
        cmd.stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| Error::Launch(format!("{what}: {e}")))
    }
}

#[async_trait]
impl FileOpener for SystemOpener {
    async fn open(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(Error::Launch(format!("{} does not exist", path.display())));
        }

        let cmd = if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg(path);
            cmd
        } else if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", ""]).arg(path);
            cmd
        } else {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(path);
            cmd
        };

        tracing::info!(path = %path.display(), "opening file");
        Self::spawn(cmd, "open")
    }

    async fn launch(&self, app: &str) -> Result<()> {
        let app = app.trim();
        if app.is_empty() {
            return Err(Error::Launch("no application name".to_string()));
        }

        if cfg!(target_os = "macos") {
            // `open -a` fails fast when the application is unknown
            let status = Command::new("open")
                .args(["-a", app])
                .status()
                .await
                .map_err(|e| Error::Launch(e.to_string()))?;
            return if status.success() {
                Ok(())
            } else {
                Err(Error::Launch(format!("no application named {app}")))
            };
        }

        let cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "", app]);
            cmd
        } else {
            // "visual studio code" may be installed as visual-studio-code
            let candidates = [app.to_string(), app.replace(' ', "-"), app.replace(' ', "")];
            let program = candidates
                .iter()
                .find_map(|name| which::which(name).ok())
                .ok_or_else(|| Error::Launch(format!("{app} not found on PATH")))?;
            Command::new(program)
        };

        tracing::info!(app, "launching application");
        Self::spawn(cmd, app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_missing_path_is_launch_error() {
        let err = SystemOpener
            .open(Path::new("/definitely/not/here.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Launch(_)));
    }

    #[tokio::test]
    async fn test_launch_empty_name_fails() {
        let err = SystemOpener.launch("  ").await.unwrap_err();
        assert!(matches!(err, Error::Launch(_)));
    }
}
