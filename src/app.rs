use crate::{
    config::{default_locale, system_locale, AppConfig, AppPaths, ConfigStore},
    error::Result,
    log_stream::LogStreamReducer,
    params::ParameterSet,
    params_store::ParamsStore,
    runner::{self, RunConsole},
    session::SetupSession,
    tools::ToolResolver,
};
use std::path::{Path, PathBuf};
use viralflow_protocol::{LogEntry, RunStatus};

/// Everything one front-end session works with. Built once per process and
/// passed by reference to the command layer.
#[derive(Debug)]
pub struct ViralflowApp {
    paths: AppPaths,
    params: ParamsStore,
    config: ConfigStore,
    tools: ToolResolver,
    session: SetupSession,
    setup_log: LogStreamReducer,
    console: RunConsole,
}

impl ViralflowApp {
    pub fn new(paths: AppPaths, tools: ToolResolver) -> Self {
        let locale = default_locale(system_locale().as_deref());
        Self {
            params: ParamsStore::new(paths.params_path()),
            config: ConfigStore::new(paths.config_path(), locale),
            paths,
            tools,
            session: SetupSession::new(),
            setup_log: LogStreamReducer::new(),
            console: RunConsole::new(),
        }
    }

    /// Resolves the configuration directory from the environment.
    pub fn from_env(config_dir: Option<PathBuf>) -> Self {
        let tools = ToolResolver::from_env();
        let paths = AppPaths::resolve(config_dir, tools.home());
        Self::new(paths, tools)
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn home(&self) -> Option<&Path> {
        self.tools.home()
    }

    pub fn tools(&self) -> &ToolResolver {
        &self.tools
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config
    }

    pub fn config(&self) -> AppConfig {
        self.config.load()
    }

    pub fn load_params(&self) -> ParameterSet {
        self.params.load()
    }

    pub fn save_params(&self, params: &ParameterSet) -> Result<()> {
        self.params.save(params)
    }

    pub fn session(&self) -> &SetupSession {
        &self.session
    }

    /// Setup steps log into their own panel, separate from run output.
    pub fn setup_parts(&mut self) -> (&mut SetupSession, &ConfigStore, &mut LogStreamReducer) {
        (&mut self.session, &self.config, &mut self.setup_log)
    }

    pub fn setup_log(&self) -> &[LogEntry] {
        self.setup_log.entries()
    }

    pub fn run_log(&self) -> &[LogEntry] {
        self.console.entries()
    }

    pub fn run_status(&self) -> RunStatus {
        self.console.status()
    }

    pub fn working_dir(&self) -> PathBuf {
        runner::viralflow_cwd(&self.config.load(), self.tools.home())
    }

    /// Runs with the stored parameters.
    pub fn start_run(&mut self) -> RunStatus {
        let params = self.params.load();
        let cwd = self.working_dir();
        self.console.start_run(Some(&params), &cwd, &self.tools)
    }

    pub fn resolve_out_dir(&self) -> Option<PathBuf> {
        let params = self.params.load();
        runner::resolve_out_dir(&params.out_dir, &self.working_dir())
    }
}
