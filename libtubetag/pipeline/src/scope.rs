use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};

use tap::TapFallible;
use tempfile::{TempDir, TempPath};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::dto::pipeline_error::{Classify, ErrorKind};

const SCOPE_PREFIX: &str = "tubetag-";

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("Scope is already closed")]
    Closed,
    #[error("{0} was cancelled before it exited")]
    Cancelled(String),
    #[error("Failed to spawn {0}: {1}")]
    Spawn(String, io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Classify for ScopeError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::InternalError
    }
}

/// Working area for a single request.
///
/// Every temp file handed out lives inside a private temp directory and every subprocess is
/// spawned with `kill_on_drop` and tied to the scope's cancellation token. Closing the scope (or
/// dropping it) cancels the token, which kills any child still running even if its handle is
/// never awaited, then removes the files and the directory. Release is best-effort: failures are logged and the remaining resources are still
/// released.
#[derive(Debug)]
pub struct ResourceScope {
    dir: Option<TempDir>,
    dir_path: PathBuf,
    files: Vec<TempPath>,
    token: CancellationToken,
    spawned: usize,
    closed: bool,
}

impl ResourceScope {
    /// Opens a scope in the system temp dir, or inside `root` if given.
    pub fn open(root: Option<&Path>) -> Result<Self, ScopeError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCOPE_PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let dir_path = dir.path().to_owned();
        debug!("opened scope at {dir_path:?}");

        Ok(Self {
            dir: Some(dir),
            dir_path,
            files: Vec::new(),
            token: CancellationToken::new(),
            spawned: 0,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir_path
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Creates an empty temp file with the given suffix (ex: `.webm`) and returns its path.
    pub fn new_temp_file(&mut self, suffix: &str) -> Result<PathBuf, ScopeError> {
        let Some(dir) = &self.dir else {
            return Err(ScopeError::Closed);
        };
        let temp_path = tempfile::Builder::new()
            .prefix("tmp")
            .suffix(suffix)
            .tempfile_in(dir.path())?
            .into_temp_path();
        let path = temp_path.to_path_buf();
        self.files.push(temp_path);
        Ok(path)
    }

    /// Spawns `command` as a child of this scope.
    pub fn spawn(&mut self, mut command: Command) -> Result<ScopedChild, ScopeError> {
        if self.closed {
            return Err(ScopeError::Closed);
        }
        let program = command
            .as_std()
            .get_program()
            .to_string_lossy()
            .into_owned();
        let mut child = command
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ScopeError::Spawn(program.clone(), e))?;
        self.spawned += 1;
        let pid = child.id();
        debug!("spawned {program} with pid {pid:?}");

        let token = self.token.child_token();
        let (exit_tx, exit_rx) = oneshot::channel();
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::spawn(supervise(child, program.clone(), token.clone(), exit_tx));

        Ok(ScopedChild {
            program,
            pid,
            stdin,
            stdout,
            stderr,
            exit: exit_rx,
            _guard: token.clone().drop_guard(),
            token,
        })
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.token.cancel();

        for file in self.files.drain(..) {
            let path = file.to_path_buf();
            let _ = file
                .close()
                .tap_err(|e| warn!("error removing temp file {path:?}: {e:?}"));
        }
        if let Some(dir) = self.dir.take() {
            let _ = dir
                .close()
                .tap_err(|e| warn!("error removing scope dir {:?}: {e:?}", self.dir_path));
        }
        info!(
            "closed scope {:?}, {} subprocess(es) spawned",
            self.dir_path, self.spawned
        );
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        self.close();
    }
}

/// A subprocess owned by a [`ResourceScope`].
///
/// The process itself is held by a supervisor task that kills it as soon as the scope closes or
/// this handle is dropped, whether or not anyone is waiting on it.
#[derive(Debug)]
pub struct ScopedChild {
    program: String,
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    exit: oneshot::Receiver<io::Result<Option<ExitStatus>>>,
    token: CancellationToken,
    _guard: DropGuard,
}

impl ScopedChild {
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    /// Waits for the process to exit and collects its piped output. If the owning scope is closed
    /// first, the process is killed and [`ScopeError::Cancelled`] is returned.
    pub async fn wait_with_output(self) -> Result<Output, ScopeError> {
        let Self {
            program,
            stdin,
            stdout,
            stderr,
            exit,
            token,
            _guard,
            ..
        } = self;
        drop(stdin);

        let collect = async {
            let (stdout, stderr, status) = tokio::join!(read_all(stdout), read_all(stderr), exit);
            Ok::<_, io::Error>((stdout?, stderr?, status))
        };
        tokio::select! {
            collected = collect => {
                let (stdout, stderr, status) = collected?;
                match status {
                    Ok(Ok(Some(status))) => Ok(Output { status, stdout, stderr }),
                    Ok(Err(e)) => Err(e.into()),
                    // killed by the supervisor
                    Ok(Ok(None)) | Err(_) => Err(ScopeError::Cancelled(program)),
                }
            }
            _ = token.cancelled() => Err(ScopeError::Cancelled(program)),
        }
    }
}

async fn supervise(
    mut child: Child,
    program: String,
    token: CancellationToken,
    exit: oneshot::Sender<io::Result<Option<ExitStatus>>>,
) {
    let status = tokio::select! {
        status = child.wait() => status.map(Some),
        _ = token.cancelled() => {
            warn!("{program} cancelled, killing process");
            child
                .kill()
                .await
                .tap_err(|e| warn!("error killing {program}: {e:?}"))
                .map(|_| None)
        }
    };
    // nobody is listening once the handle is gone
    let _ = exit.send(status);
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[cfg(test)]
#[path = "./scope_test.rs"]
mod scope_test;
