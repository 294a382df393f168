//! Worker - 計算用サブプロセスの起動と出力の回収
//!
//! stdout と stderr を 1 つの task の `select!` ループで交互に読む。片方の
//! pipe が詰まってもう片方が止まる deadlock を避けるため、両方が EOF に
//! なるまで読み切ってから exit を待つ。

use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::config::SidecarConfig;
use crate::domain::errors::{FailureDetail, Result, SidecarError};
use crate::domain::platform::Platform;

const READ_CHUNK: usize = 4096;

/// Program plus arguments, resolved before launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Interpreter and script path for `platform`.
    ///
    /// sgx runs inside the library OS image where scripts sit at `/`;
    /// every other platform uses `<worker_root>/<plat>/teeapps/biz/`.
    pub fn resolve(platform: Platform, script: &str, config: &SidecarConfig) -> Self {
        match platform {
            Platform::Sgx => Self::new(&config.occlum_python_path, vec![format!("/{script}")]),
            Platform::Sim | Platform::Tdx | Platform::Csv => {
                let script_path = config
                    .worker_root
                    .join(platform.as_str())
                    .join("teeapps/biz")
                    .join(script);
                Self::new(
                    &config.python_path,
                    vec![script_path.to_string_lossy().into_owned()],
                )
            }
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for WorkerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Everything the worker wrote, plus how it ended. Captured output stays
/// available whatever the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: std::result::Result<(), FailureDetail>,
}

impl WorkerOutput {
    pub fn success(&self) -> bool {
        self.status.is_ok()
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Launch `cmd` and collect its output.
///
/// Only a launch failure is an `Err`; a nonzero exit, a signal or a failed
/// wait is reported through [`WorkerOutput::status`].
pub async fn run(cmd: &WorkerCommand) -> Result<WorkerOutput> {
    let launch_error = |message: String| SidecarError::Launch {
        program: cmd.program.display().to_string(),
        message,
    };

    info!(command = %cmd, "launching worker");
    let mut child = Command::new(&cmd.program)
        .args(&cmd.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| launch_error(e.to_string()))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| launch_error("stdout pipe missing".to_string()))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| launch_error("stderr pipe missing".to_string()))?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut out_chunk = [0u8; READ_CHUNK];
    let mut err_chunk = [0u8; READ_CHUNK];
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        tokio::select! {
            read = stdout_pipe.read(&mut out_chunk), if out_open => match read {
                Ok(0) => out_open = false,
                Ok(n) => stdout.extend_from_slice(&out_chunk[..n]),
                Err(e) => {
                    warn!(error = %e, "reading worker stdout failed");
                    out_open = false;
                }
            },
            read = stderr_pipe.read(&mut err_chunk), if err_open => match read {
                Ok(0) => err_open = false,
                Ok(n) => stderr.extend_from_slice(&err_chunk[..n]),
                Err(e) => {
                    warn!(error = %e, "reading worker stderr failed");
                    err_open = false;
                }
            },
        }
    }

    // tokio retries interrupted waits internally
    let status = match child.wait().await {
        Ok(status) => exit_detail(status),
        Err(e) => Err(FailureDetail::Os(e.to_string())),
    };

    let output = WorkerOutput {
        stdout,
        stderr,
        status,
    };
    if !output.stdout.is_empty() {
        info!(stdout = %output.stdout_lossy(), "worker stdout");
    }
    if !output.stderr.is_empty() {
        error!(stderr = %output.stderr_lossy(), "worker stderr");
    }
    match &output.status {
        Ok(()) => info!("worker exited successfully"),
        Err(detail) => error!(%detail, "worker failed"),
    }
    Ok(output)
}

fn exit_detail(status: ExitStatus) -> std::result::Result<(), FailureDetail> {
    if status.success() {
        return Ok(());
    }
    if let Some(code) = status.code() {
        return Err(FailureDetail::ExitCode(code));
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Err(FailureDetail::Signal(signal));
        }
    }
    Err(FailureDetail::Os(format!("unrecognized exit status {status}")))
}
