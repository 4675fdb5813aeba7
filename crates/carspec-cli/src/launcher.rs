use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;

use carspec_core::error::AppError;
use carspec_core::orchestrator::{WorkerExit, WorkerSpec};
use carspec_core::traits::WorkerLauncher;
use tokio::process::Command;

/// Runs each worker as a `carspec batch` child process of the current binary.
///
/// Output of the child goes to the worker's log file. The environment
/// (including `RUST_LOG` and `CHROME_BIN`) is inherited.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    exe: PathBuf,
    with_reviews: bool,
    headed: bool,
    debug_html: bool,
    chrome_bin: Option<String>,
}

impl ProcessLauncher {
    pub fn new(exe: PathBuf) -> Self {
        Self {
            exe,
            with_reviews: false,
            headed: false,
            debug_html: true,
            chrome_bin: None,
        }
    }

    pub fn current() -> Result<Self, AppError> {
        let exe = std::env::current_exe()
            .map_err(|e| AppError::WorkerError(format!("Cannot locate own executable: {e}")))?;
        Ok(Self::new(exe))
    }

    pub fn with_reviews(mut self, enabled: bool) -> Self {
        self.with_reviews = enabled;
        self
    }

    pub fn with_headed(mut self, headed: bool) -> Self {
        self.headed = headed;
        self
    }

    pub fn with_debug_html(mut self, enabled: bool) -> Self {
        self.debug_html = enabled;
        self
    }

    pub fn with_chrome_bin(mut self, bin: Option<String>) -> Self {
        self.chrome_bin = bin;
        self
    }

    fn args(&self, spec: &WorkerSpec) -> Vec<String> {
        let mut args = vec![
            "batch".to_string(),
            "--batch-file".to_string(),
            spec.batch_file.display().to_string(),
            "--output-dir".to_string(),
            spec.output_root.display().to_string(),
            "--worker-id".to_string(),
            format!("worker-{}", spec.id),
        ];
        if self.with_reviews {
            args.push("--with-reviews".to_string());
        }
        if self.headed {
            args.push("--headed".to_string());
        }
        if !self.debug_html {
            args.push("--no-debug-html".to_string());
        }
        if let Some(bin) = &self.chrome_bin {
            args.push("--chrome-bin".to_string());
            args.push(bin.clone());
        }
        args
    }
}

impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, spec: &WorkerSpec) -> Result<WorkerExit, AppError> {
        let log = File::create(&spec.log_file)?;
        let log_err = log.try_clone()?;

        let status = Command::new(&self.exe)
            .args(self.args(spec))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| {
                AppError::WorkerError(format!("worker {} failed to start: {e}", spec.id))
            })?;

        Ok(WorkerExit {
            id: spec.id,
            success: status.success(),
            code: status.code(),
        })
    }
}
