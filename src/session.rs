//! Simulated environment setup.
//!
//! Nothing here executes a command. Each step reports what it would have done
//! to a [`LogSink`] and flips the corresponding flag of the session. A session
//! starts with nothing installed, so every new process starts from scratch;
//! only `containersBuilt` is mirrored into the persisted config.

use crate::{
    config::{AppConfig, ConfigStore},
    error::{Result, ViralflowError},
    log_stream::LogSink,
};
use std::path::{Path, PathBuf};
use tracing::info;
use viralflow_protocol::{EnvironmentStatus, LogEntry, PangolinUpdateMode};

pub const FAKE_MICROMAMBA_VERSION: &str = "MVP-fake-micromamba";
pub const FAKE_VIRALFLOW_VERSION: &str = "MVP-fake-viralflow";

pub fn default_repo_path(home: Option<&Path>) -> PathBuf {
    home.map(|h| h.join("ViralFlow"))
        .unwrap_or_else(|| PathBuf::from("ViralFlow"))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupSession {
    micromamba_installed: bool,
    viralflow_installed: bool,
    containers_built: bool,
}

fn fail(sink: &mut dyn LogSink, message: &str) -> ViralflowError {
    sink.push(LogEntry::stderr(format!("\n{message}\n")));
    ViralflowError::precondition(message)
}

impl SetupSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn micromamba_installed(&self) -> bool {
        self.micromamba_installed
    }

    pub fn viralflow_installed(&self) -> bool {
        self.viralflow_installed
    }

    /// Containers count as built only when both the session and the
    /// persisted config agree.
    pub fn check_install(&self, config: &AppConfig) -> EnvironmentStatus {
        EnvironmentStatus {
            micromamba_installed: self.micromamba_installed,
            micromamba_version: self
                .micromamba_installed
                .then(|| FAKE_MICROMAMBA_VERSION.to_string()),
            viralflow_installed: self.viralflow_installed,
            viralflow_version: self
                .viralflow_installed
                .then(|| FAKE_VIRALFLOW_VERSION.to_string()),
            containers_built: config.containers_built && self.containers_built,
        }
    }

    fn require_tools(&self, sink: &mut dyn LogSink, action: &str) -> Result<()> {
        if self.micromamba_installed && self.viralflow_installed {
            Ok(())
        } else {
            Err(fail(
                sink,
                &format!(
                    "Micromamba and/or ViralFlow (fake) are not installed. Simulate the installation before {action}."
                ),
            ))
        }
    }

    pub fn install_micromamba(&mut self, sink: &mut dyn LogSink) -> EnvironmentStatus {
        sink.push(LogEntry::stdout(
            "\n=== [MVP] Simulating micromamba installation ===\n",
        ));
        self.micromamba_installed = true;
        sink.push(LogEntry::stdout(format!(
            "\nMicromamba (fake) installed. Simulated version: {FAKE_MICROMAMBA_VERSION}\n"
        )));
        info!(step = "install-micromamba", "simulated setup step");
        EnvironmentStatus {
            micromamba_installed: true,
            micromamba_version: Some(FAKE_MICROMAMBA_VERSION.to_string()),
            viralflow_installed: self.viralflow_installed,
            viralflow_version: self
                .viralflow_installed
                .then(|| FAKE_VIRALFLOW_VERSION.to_string()),
            containers_built: self.containers_built,
        }
    }

    /// Reinstalling invalidates previously built containers.
    pub fn install_viralflow(
        &mut self,
        config: &ConfigStore,
        sink: &mut dyn LogSink,
    ) -> Result<EnvironmentStatus> {
        sink.push(LogEntry::stdout(
            "\n=== [MVP] Simulating ViralFlow installation ===\n",
        ));
        if !self.micromamba_installed {
            return Err(fail(
                sink,
                "Micromamba (fake) is not installed yet. Simulate the micromamba installation before installing ViralFlow.",
            ));
        }
        self.viralflow_installed = true;
        sink.push(LogEntry::stdout(format!(
            "\nViralFlow (fake) installed. Simulated version: {FAKE_VIRALFLOW_VERSION}\n"
        )));
        self.containers_built = false;
        config.set_containers_built(false)?;
        info!(step = "install-viralflow", "simulated setup step");
        Ok(EnvironmentStatus {
            micromamba_installed: true,
            micromamba_version: Some(FAKE_MICROMAMBA_VERSION.to_string()),
            viralflow_installed: true,
            viralflow_version: Some(FAKE_VIRALFLOW_VERSION.to_string()),
            containers_built: false,
        })
    }

    pub fn build_containers(&mut self, config: &ConfigStore, sink: &mut dyn LogSink) -> Result<()> {
        sink.push(LogEntry::stdout(
            "\n=== [MVP] Simulating ViralFlow container build ===\n",
        ));
        self.require_tools(sink, "building the containers")?;
        self.containers_built = true;
        config.set_containers_built(true)?;
        sink.push(LogEntry::stdout(
            "\nContainers (fake) built successfully. No real command was executed.\n",
        ));
        info!(step = "build-containers", "simulated setup step");
        Ok(())
    }

    pub fn update_pangolin(&self, mode: PangolinUpdateMode, sink: &mut dyn LogSink) -> Result<()> {
        sink.push(LogEntry::stdout("\n=== [MVP] Simulating Pangolin update ===\n"));
        self.require_tools(sink, "updating Pangolin")?;
        sink.push(LogEntry::stdout(format!(
            "\n[MVP] Pangolin update ({}) simulated successfully. No real command was executed.\n",
            mode.describe()
        )));
        info!(step = "update-pangolin", ?mode, "simulated setup step");
        Ok(())
    }

    pub fn add_snpeff_entry(
        &self,
        org_name: &str,
        genome_code: &str,
        sink: &mut dyn LogSink,
    ) -> Result<()> {
        if org_name.trim().is_empty() || genome_code.trim().is_empty() {
            let message = "Parameters org_name and genome_code are required.";
            sink.push(LogEntry::stderr(format!("\n{message}\n")));
            return Err(ViralflowError::invalid_input(message));
        }
        sink.push(LogEntry::stdout(
            "\n=== [MVP] Simulating snpEff entry addition ===\n",
        ));
        self.require_tools(sink, "customizing snpEff")?;
        sink.push(LogEntry::stdout(format!(
            "\nEntry (fake) added to snpEff for org_name=\"{org_name}\", genome_code=\"{genome_code}\". No real command was executed.\n"
        )));
        info!(step = "add-snpeff", org_name, genome_code, "simulated setup step");
        Ok(())
    }

    /// Points the configured repository at the default location.
    pub fn clone_default_repo(
        &self,
        config: &ConfigStore,
        home: Option<&Path>,
        sink: &mut dyn LogSink,
    ) -> Result<PathBuf> {
        let target = default_repo_path(home);
        config.set_repo_path(Some(target.clone()))?;
        sink.push(LogEntry::stdout(format!(
            "\n=== [MVP] Simulating ViralFlow repository clone ===\nSimulated repository at: {}\nNo real git command was executed.\n",
            target.display()
        )));
        info!(step = "clone", path = %target.display(), "simulated setup step");
        Ok(target)
    }

    pub fn git_pull(&self, config: &ConfigStore, sink: &mut dyn LogSink) -> Result<String> {
        let Some(repo) = config.load().repo_path else {
            return Err(ViralflowError::precondition("Repository path is not configured."));
        };
        sink.push(LogEntry::stdout(format!(
            "\n=== [MVP] Simulating git pull (ViralFlow) ===\nRepository: {}\nNo real git command was executed.\n",
            repo.display()
        )));
        info!(step = "pull", path = %repo.display(), "simulated setup step");
        Ok("[MVP] git pull simulated successfully.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use viralflow_protocol::LogKind;

    fn config_store(dir: &Path) -> ConfigStore {
        ConfigStore::new(dir.join("config.json"), "en".to_string())
    }

    #[test]
    fn test_new_session_has_nothing_installed() {
        let session = SetupSession::new();
        let status = session.check_install(&AppConfig::with_locale("en".to_string()));
        assert_eq!(status, EnvironmentStatus::default());
    }

    #[test]
    fn test_viralflow_requires_micromamba() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_store(dir.path());
        let mut session = SetupSession::new();
        let mut log: Vec<LogEntry> = vec![];
        let err = session.install_viralflow(&config, &mut log).unwrap_err();
        assert_eq!(err.code, ErrorCode::Precondition);
        assert_eq!(log.last().map(|e| e.kind), Some(LogKind::Stderr));
        assert!(!session.viralflow_installed());
    }

    #[test]
    fn test_full_setup_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_store(dir.path());
        let mut session = SetupSession::new();
        let mut log: Vec<LogEntry> = vec![];

        let status = session.install_micromamba(&mut log);
        assert_eq!(status.micromamba_version.as_deref(), Some(FAKE_MICROMAMBA_VERSION));
        assert!(session.build_containers(&config, &mut log).is_err());

        session.install_viralflow(&config, &mut log).unwrap();
        session.build_containers(&config, &mut log).unwrap();
        let status = session.check_install(&config.load());
        assert!(status.micromamba_installed && status.viralflow_installed);
        assert!(status.containers_built);

        session.install_viralflow(&config, &mut log).unwrap();
        assert!(!config.load().containers_built);
        assert!(!session.check_install(&config.load()).containers_built);
    }

    #[test]
    fn test_containers_need_session_and_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_store(dir.path());
        config.set_containers_built(true).unwrap();
        let session = SetupSession::new();
        assert!(!session.check_install(&config.load()).containers_built);
    }

    #[test]
    fn test_pangolin_and_snpeff_need_tools() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_store(dir.path());
        let mut session = SetupSession::new();
        let mut log: Vec<LogEntry> = vec![];
        assert!(session.update_pangolin(PangolinUpdateMode::DataOnly, &mut log).is_err());

        let err = session.add_snpeff_entry("", "NC_1", &mut log).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        session.install_micromamba(&mut log);
        session.install_viralflow(&config, &mut log).unwrap();
        session.update_pangolin(PangolinUpdateMode::DataOnly, &mut log).unwrap();
        assert!(log.last().unwrap().text.contains("databases only"));
        session.add_snpeff_entry("sars2", "NC_045512", &mut log).unwrap();
        assert!(log.last().unwrap().text.contains("genome_code=\"NC_045512\""));
    }

    #[test]
    fn test_clone_then_pull() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_store(dir.path());
        let session = SetupSession::new();
        let mut log: Vec<LogEntry> = vec![];

        let err = session.git_pull(&config, &mut log).unwrap_err();
        assert_eq!(err.code, ErrorCode::Precondition);

        let home = Path::new("/home/ana");
        let target = session.clone_default_repo(&config, Some(home), &mut log).unwrap();
        assert_eq!(target, PathBuf::from("/home/ana/ViralFlow"));
        assert_eq!(config.load().repo_path, Some(target));
        let msg = session.git_pull(&config, &mut log).unwrap();
        assert!(msg.contains("simulated"));
        assert!(log.last().unwrap().text.contains("/home/ana/ViralFlow"));
    }
}
