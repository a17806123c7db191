use crate::{
    config::AppConfig,
    log_stream::{LogSink, LogStreamReducer},
    params::ParameterSet,
    params_codec,
    session::default_repo_path,
    tools::ToolResolver,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use viralflow_protocol::{LogEntry, RunOutcome, RunStatus};

/// Fixed file name, overwritten by every run.
pub const PARAMS_FILE_NAME: &str = "viralflow-gui.params";
pub const SIMULATED_STDOUT: &str = "MVP: simulated ViralFlow run. The parameters file was generated, but no real command was executed.\n";
pub const NO_PARAMS_MESSAGE: &str = "No parameters available. Save the parameters before running.";

/// Directory ViralFlow is launched from: the configured repository, else
/// `$HOME/ViralFlow` when it exists, else the current directory.
pub fn viralflow_cwd(config: &AppConfig, home: Option<&Path>) -> PathBuf {
    if let Some(repo) = &config.repo_path {
        return repo.clone();
    }
    let default = default_repo_path(home);
    if default.exists() {
        return default;
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Relative output directories are interpreted against the launch directory.
pub fn resolve_out_dir(out_dir: &str, base: &Path) -> Option<PathBuf> {
    if out_dir.is_empty() {
        return None;
    }
    let path = Path::new(out_dir);
    if path.is_absolute() {
        Some(path.to_path_buf())
    } else {
        Some(base.join(path))
    }
}

/// Double-quotes `text` for the displayed command line.
fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\\\""))
}

#[derive(Debug, Clone, Serialize)]
pub struct ViralflowCommand {
    pub cmd: String,
    pub args: Vec<String>,
    /// Variables set for the micromamba process, e.g. `MAMBA_ROOT_PREFIX`.
    pub env: Vec<(String, String)>,
    pub params: ParameterSet,
    pub params_path: PathBuf,
}

/// Normalizes `params`, writes them next to the launch directory and returns
/// the command line that would start the pipeline.
pub fn build_command(params: &ParameterSet, cwd: &Path, tools: &ToolResolver) -> ViralflowCommand {
    let params = params.normalized();
    let joined = cwd.join(PARAMS_FILE_NAME);
    let params_path = std::path::absolute(&joined).unwrap_or(joined);

    // The command is still reported when the file cannot be written.
    if let Err(e) = params_codec::export_params_file(&params_path, &params) {
        warn!(error = %e, "could not write params file for execution");
    }

    let micromamba = tools.micromamba_command();
    let program = if micromamba.contains(|c: char| c.is_whitespace() || c == '"') {
        quoted(&micromamba)
    } else {
        micromamba.clone()
    };
    let path_text = params_path.display().to_string();
    let cmd = format!(
        "{program} run -n viralflow viralflow -run --params {}",
        quoted(&path_text)
    );
    let args = [
        micromamba.as_str(),
        "run",
        "-n",
        "viralflow",
        "viralflow",
        "-run",
        "--params",
        path_text.as_str(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    ViralflowCommand {
        cmd,
        args,
        env: tools.micromamba_env(),
        params,
        params_path,
    }
}

/// Simulated run: reports the command and canned output without executing
/// anything.
pub fn run(
    params: &ParameterSet,
    cwd: &Path,
    tools: &ToolResolver,
    sink: &mut dyn LogSink,
) -> RunOutcome {
    let command = build_command(params, cwd, tools);
    info!(cmd = %command.cmd, env = ?command.env, "simulated viralflow run");
    sink.push(LogEntry::stdout(format!("\n$ {}\n", command.cmd)));
    sink.push(LogEntry::stdout(SIMULATED_STDOUT));
    RunOutcome {
        ok: true,
        cmd: command.cmd,
        stdout: SIMULATED_STDOUT.to_string(),
        stderr: String::new(),
    }
}

/// Run status plus the folded log of the latest run.
#[derive(Debug, Clone, Default)]
pub struct RunConsole {
    status: RunStatus,
    log: LogStreamReducer,
}

impl RunConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn entries(&self) -> &[LogEntry] {
        self.log.entries()
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    pub fn start_run(
        &mut self,
        params: Option<&ParameterSet>,
        cwd: &Path,
        tools: &ToolResolver,
    ) -> RunStatus {
        self.log.reset();
        let Some(params) = params else {
            self.status = RunStatus::Error;
            self.log.apply(LogEntry::stderr(NO_PARAMS_MESSAGE));
            return self.status;
        };
        self.status = RunStatus::Running;
        let outcome = run(params, cwd, tools, &mut self.log);
        self.status = if outcome.ok {
            RunStatus::Success
        } else {
            RunStatus::Error
        };
        self.status
    }
}
