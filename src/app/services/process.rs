//! External script execution for the Run action.
//!
//! One child per document. Output from both pipes is collected by reader
//! threads and drained on the main flow into the document's log.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::app::infrastructure::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChunk {
    Stdout(String),
    Stderr(String),
}

impl OutputChunk {
    pub fn text(&self) -> &str {
        match self {
            Self::Stdout(s) | Self::Stderr(s) => s,
        }
    }
}

pub struct ScriptProcess {
    script: PathBuf,
    child: Child,
    output: Receiver<OutputChunk>,
    readers: Vec<JoinHandle<()>>,
    exit: Option<ExitStatus>,
}

impl std::fmt::Debug for ScriptProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptProcess")
            .field("script", &self.script)
            .field("pid", &self.child.id())
            .field("exit", &self.exit)
            .finish()
    }
}

/// Build the command line: the whitespace-separated `prefix` words followed
/// by the script path, or the script alone when the prefix is empty.
pub fn build_command(script: &Path, prefix: &str) -> Command {
    let mut words = prefix.split_whitespace();
    match words.next() {
        Some(program) => {
            let mut cmd = Command::new(program);
            cmd.args(words).arg(script);
            cmd
        }
        None => Command::new(script),
    }
}

#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn spawn_reader<R, F>(pipe: R, tx: Sender<OutputChunk>, wrap: F) -> JoinHandle<()>
where
    R: Read + Send + 'static,
    F: Fn(String) -> OutputChunk + Send + 'static,
{
    thread::spawn(move || {
        let reader = BufReader::new(pipe);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if tx.send(wrap(line)).is_err() {
                break;
            }
        }
    })
}

impl ScriptProcess {
    pub fn spawn(script: &Path, command_prefix: &str) -> Result<Self> {
        let mut child = build_command(script, command_prefix)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                warn!(script = %script.display(), error = %e, "failed to start script");
                AppError::NotRunnable(format!("{}: {}", script.display(), e))
            })?;

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            readers.push(spawn_reader(out, tx.clone(), OutputChunk::Stdout));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(spawn_reader(err, tx, OutputChunk::Stderr));
        }

        info!(script = %script.display(), pid = child.id(), "script started");
        Ok(Self {
            script: script.to_path_buf(),
            child,
            output: rx,
            readers,
            exit: None,
        })
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Non-blocking check; reaps the child once it has exited.
    pub fn is_running(&mut self) -> bool {
        if self.exit.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid = self.child.id(), ?status, "script exited");
                self.exit = Some(status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(pid = self.child.id(), error = %e, "failed to query script status");
                false
            }
        }
    }

    pub fn kill(&mut self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }
        info!(pid = self.child.id(), "killing script");
        self.child.kill()?;
        self.exit = Some(self.child.wait()?);
        Ok(())
    }

    /// Block until the child exits and both pipes are closed.
    pub fn wait(&mut self) -> Result<ExitStatus> {
        let status = match self.exit {
            Some(status) => status,
            None => {
                let status = self.child.wait()?;
                self.exit = Some(status);
                status
            }
        };
        for reader in self.readers.drain(..) {
            let _ = reader.join();
        }
        Ok(status)
    }

    /// Output produced since the last drain, in arrival order.
    pub fn drain_output(&self) -> Vec<OutputChunk> {
        self.output.try_iter().collect()
    }
}

impl Drop for ScriptProcess {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
