use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info};
use which::which;

#[derive(Error, Debug)]
#[error("{exe_name} not found. Set {env_var} or add it to PATH: {source}")]
pub struct ExeNotFound {
    exe_name: String,
    env_var: String,
    source: which::Error,
}

/// Resolves an executable. An explicit path wins, then the environment variable, then `PATH`.
pub fn find_exe(
    explicit: Option<&Path>,
    env_var: &str,
    exe_name: &str,
) -> Result<PathBuf, ExeNotFound> {
    let path = match explicit {
        Some(path) => path.to_owned(),
        None => match env::var_os(env_var) {
            Some(path) => PathBuf::from(path),
            None => which(exe_name).map_err(|source| {
                error!("{exe_name} path not found: {source:?}");
                ExeNotFound {
                    exe_name: exe_name.to_owned(),
                    env_var: env_var.to_owned(),
                    source,
                }
            })?,
        },
    };

    info!("Using {exe_name} path: {path:?}");
    Ok(path)
}

/// Last few lines of a process's stderr, enough to explain a failure without flooding logs.
pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    const MAX_LINES: usize = 10;
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(MAX_LINES);
    lines[start..].join("\n")
}
