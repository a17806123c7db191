use crate::{
    about,
    app::ViralflowApp,
    params::ParameterSet,
    params_codec,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use viralflow_protocol::PangolinUpdateMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupStep {
    Clone,
    Pull,
    InstallMicromamba,
    InstallViralflow,
    BuildContainers,
    UpdatePangolin(PangolinUpdateMode),
    AddSnpeff {
        org_name: String,
        genome_code: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Run,
    Setup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Help,
    Version,
    Status,
    ConfigShow,
    ConfigSetRepo { path: Option<String> },
    ConfigSetLocale { locale: Option<String> },
    ParamsShow,
    ParamsNormalized,
    ParamsPreview,
    ParamsSet { key: String, value: String },
    ParamsReset,
    ParamsExport { path: String },
    ParamsImport { path: String },
    Setup(SetupStep),
    Run,
    Logs { target: LogTarget },
    OutDir,
}

#[derive(Debug, Clone)]
pub struct ShellRunResult {
    pub state_changed: bool,
    pub output: Value,
}

impl ShellCommand {
    pub fn preview(&self) -> String {
        match self {
            Self::Help => "show shell command help".to_string(),
            Self::Version => "show GUI version".to_string(),
            Self::Status => "inspect simulated environment status".to_string(),
            Self::ConfigShow => "show configuration".to_string(),
            Self::ConfigSetRepo { path } => match path {
                Some(path) => format!("set ViralFlow repository to '{path}'"),
                None => "clear ViralFlow repository path".to_string(),
            },
            Self::ConfigSetLocale { locale } => {
                let locale = locale.clone().unwrap_or_else(|| "default".to_string());
                format!("set locale to {locale}")
            }
            Self::ParamsShow => "show stored parameters".to_string(),
            Self::ParamsNormalized => "show parameters as used for execution".to_string(),
            Self::ParamsPreview => "preview generated .params file".to_string(),
            Self::ParamsSet { key, value } => format!("set parameter {key} to '{value}'"),
            Self::ParamsReset => "restore default parameters".to_string(),
            Self::ParamsExport { path } => format!("export .params file to '{path}'"),
            Self::ParamsImport { path } => format!("import .params file from '{path}'"),
            Self::Setup(step) => match step {
                SetupStep::Clone => "simulate cloning the ViralFlow repository".to_string(),
                SetupStep::Pull => "simulate git pull of the ViralFlow repository".to_string(),
                SetupStep::InstallMicromamba => "simulate micromamba installation".to_string(),
                SetupStep::InstallViralflow => "simulate ViralFlow installation".to_string(),
                SetupStep::BuildContainers => "simulate container build".to_string(),
                SetupStep::UpdatePangolin(mode) => {
                    format!("simulate Pangolin update ({})", mode.describe())
                }
                SetupStep::AddSnpeff {
                    org_name,
                    genome_code,
                } => format!("simulate snpEff entry '{org_name}' / '{genome_code}'"),
            },
            Self::Run => "run ViralFlow (simulated) with stored parameters".to_string(),
            Self::Logs { target } => match target {
                LogTarget::Run => "show run log".to_string(),
                LogTarget::Setup => "show setup log".to_string(),
            },
            Self::OutDir => "resolve output directory".to_string(),
        }
    }

    /// True for commands that change stored configuration, parameters,
    /// the simulated environment or written run files. Setup steps that only
    /// produce log output do not count.
    pub fn is_state_mutating(&self) -> bool {
        matches!(
            self,
            Self::ConfigSetRepo { .. }
                | Self::ConfigSetLocale { .. }
                | Self::ParamsSet { .. }
                | Self::ParamsReset
                | Self::ParamsImport { .. }
                | Self::Setup(
                    SetupStep::Clone
                        | SetupStep::InstallMicromamba
                        | SetupStep::InstallViralflow
                        | SetupStep::BuildContainers
                )
                | Self::Run
        )
    }
}

pub fn shell_help_text() -> &'static str {
    "ViralFlow GUI shell commands:\n\
help\n\
version\n\
status\n\
config show\n\
config set-repo [PATH]\n\
config set-locale [LOCALE]\n\
params show|normalized|preview|reset\n\
params set KEY VALUE\n\
params export PATH.params\n\
params import PATH.params\n\
setup clone|pull|install-micromamba|install-viralflow|build-containers\n\
setup update-pangolin [full|data-only]\n\
setup add-snpeff ORG_NAME GENOME_CODE\n\
run\n\
logs [run|setup]\n\
outdir"
}

fn token_error(command: &str) -> String {
    format!("Invalid '{command}' usage. Try: help")
}

fn expect_len(tokens: &[String], len: usize, command: ShellCommand) -> Result<ShellCommand, String> {
    if tokens.len() == len {
        Ok(command)
    } else {
        Err(token_error(&tokens[..len.min(tokens.len())].join(" ")))
    }
}

fn parse_config_tokens(tokens: &[String]) -> Result<ShellCommand, String> {
    match tokens.get(1).map(String::as_str) {
        Some("show") => expect_len(tokens, 2, ShellCommand::ConfigShow),
        Some("set-repo") if tokens.len() <= 3 => Ok(ShellCommand::ConfigSetRepo {
            path: tokens.get(2).cloned(),
        }),
        Some("set-locale") if tokens.len() <= 3 => Ok(ShellCommand::ConfigSetLocale {
            locale: tokens.get(2).cloned(),
        }),
        _ => Err(token_error("config")),
    }
}

fn parse_params_tokens(tokens: &[String]) -> Result<ShellCommand, String> {
    match tokens.get(1).map(String::as_str) {
        Some("show") => expect_len(tokens, 2, ShellCommand::ParamsShow),
        Some("normalized") => expect_len(tokens, 2, ShellCommand::ParamsNormalized),
        Some("preview") => expect_len(tokens, 2, ShellCommand::ParamsPreview),
        Some("reset") => expect_len(tokens, 2, ShellCommand::ParamsReset),
        Some("set") => {
            if tokens.len() < 4 {
                return Err("params set requires: KEY VALUE".to_string());
            }
            Ok(ShellCommand::ParamsSet {
                key: tokens[2].clone(),
                value: tokens[3..].join(" "),
            })
        }
        Some("export") if tokens.len() == 3 => Ok(ShellCommand::ParamsExport {
            path: tokens[2].clone(),
        }),
        Some("import") if tokens.len() == 3 => Ok(ShellCommand::ParamsImport {
            path: tokens[2].clone(),
        }),
        _ => Err(token_error("params")),
    }
}

fn parse_setup_tokens(tokens: &[String]) -> Result<ShellCommand, String> {
    let step = match tokens.get(1).map(String::as_str) {
        Some("clone") if tokens.len() == 2 => SetupStep::Clone,
        Some("pull") if tokens.len() == 2 => SetupStep::Pull,
        Some("install-micromamba") if tokens.len() == 2 => SetupStep::InstallMicromamba,
        Some("install-viralflow") if tokens.len() == 2 => SetupStep::InstallViralflow,
        Some("build-containers") if tokens.len() == 2 => SetupStep::BuildContainers,
        Some("update-pangolin") => match tokens.get(2).map(String::as_str) {
            None | Some("full") => SetupStep::UpdatePangolin(PangolinUpdateMode::Full),
            Some("data-only") => SetupStep::UpdatePangolin(PangolinUpdateMode::DataOnly),
            Some(other) => {
                return Err(format!(
                    "Unknown Pangolin update mode '{other}', expected 'full' or 'data-only'"
                ));
            }
        },
        Some("add-snpeff") if tokens.len() == 4 => SetupStep::AddSnpeff {
            org_name: tokens[2].clone(),
            genome_code: tokens[3].clone(),
        },
        _ => return Err(token_error("setup")),
    };
    Ok(ShellCommand::Setup(step))
}

pub fn parse_shell_tokens(tokens: &[String]) -> Result<ShellCommand, String> {
    if tokens.is_empty() {
        return Err("Missing shell command".to_string());
    }
    let cmd = tokens[0].as_str();
    match cmd {
        "help" | "-h" | "--help" => Ok(ShellCommand::Help),
        "version" | "-V" | "--version" => expect_len(tokens, 1, ShellCommand::Version),
        "status" => expect_len(tokens, 1, ShellCommand::Status),
        "config" => parse_config_tokens(tokens),
        "params" => parse_params_tokens(tokens),
        "setup" => parse_setup_tokens(tokens),
        "run" => expect_len(tokens, 1, ShellCommand::Run),
        "logs" => match tokens.get(1).map(String::as_str) {
            None | Some("run") if tokens.len() <= 2 => Ok(ShellCommand::Logs {
                target: LogTarget::Run,
            }),
            Some("setup") if tokens.len() == 2 => Ok(ShellCommand::Logs {
                target: LogTarget::Setup,
            }),
            _ => Err(token_error(cmd)),
        },
        "outdir" => expect_len(tokens, 1, ShellCommand::OutDir),
        other => Err(format!("Unknown shell command '{other}'. Try: help")),
    }
}

pub fn parse_shell_line(line: &str) -> Result<ShellCommand, String> {
    let tokens = split_shell_words(line)?;
    parse_shell_tokens(&tokens)
}

pub fn split_shell_words(line: &str) -> Result<Vec<String>, String> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mode {
        Normal,
        SingleQuoted,
        DoubleQuoted,
    }

    let mut out = Vec::new();
    let mut current = String::new();
    let mut mode = Mode::Normal;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match mode {
            Mode::Normal => match ch {
                '\'' => mode = Mode::SingleQuoted,
                '"' => mode = Mode::DoubleQuoted,
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        out.push(std::mem::take(&mut current));
                    }
                }
                _ => current.push(ch),
            },
            Mode::SingleQuoted => {
                if ch == '\'' {
                    mode = Mode::Normal;
                } else {
                    current.push(ch);
                }
            }
            Mode::DoubleQuoted => {
                if ch == '"' {
                    mode = Mode::Normal;
                } else if ch == '\\' {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                } else {
                    current.push(ch);
                }
            }
        }
    }

    if mode != Mode::Normal {
        return Err("Unterminated quoted string in shell command".to_string());
    }
    if !current.is_empty() {
        out.push(current);
    }
    if out.is_empty() {
        return Err("Empty shell command".to_string());
    }
    Ok(out)
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| format!("Could not serialize {what}: {e}"))
}

fn params_output(params: &ParameterSet, message: Option<String>) -> Result<Value, String> {
    let mut output = json!({ "params": to_json(params, "parameters")? });
    if let Some(message) = message {
        output["message"] = Value::String(message);
    }
    Ok(output)
}

fn execute_setup_step(app: &mut ViralflowApp, step: &SetupStep) -> Result<Value, String> {
    let home = app.home().map(Path::to_path_buf);
    let (session, config, log) = app.setup_parts();
    // Each setup action starts with an empty log panel.
    log.reset();
    let output = match step {
        SetupStep::Clone => {
            let path = session
                .clone_default_repo(config, home.as_deref(), log)
                .map_err(|e| e.to_string())?;
            json!({ "ok": true, "path": path })
        }
        SetupStep::Pull => {
            let message = session.git_pull(config, log).map_err(|e| e.to_string())?;
            json!({ "ok": true, "log": message })
        }
        SetupStep::InstallMicromamba => to_json(&session.install_micromamba(log), "status")?,
        SetupStep::InstallViralflow => {
            let status = session
                .install_viralflow(config, log)
                .map_err(|e| e.to_string())?;
            to_json(&status, "status")?
        }
        SetupStep::BuildContainers => {
            session
                .build_containers(config, log)
                .map_err(|e| e.to_string())?;
            json!({ "ok": true, "containersBuilt": true })
        }
        SetupStep::UpdatePangolin(mode) => {
            session
                .update_pangolin(*mode, log)
                .map_err(|e| e.to_string())?;
            json!({ "ok": true })
        }
        SetupStep::AddSnpeff {
            org_name,
            genome_code,
        } => {
            session
                .add_snpeff_entry(org_name, genome_code, log)
                .map_err(|e| e.to_string())?;
            json!({ "ok": true })
        }
    };
    Ok(output)
}

pub fn execute_shell_command(
    app: &mut ViralflowApp,
    command: &ShellCommand,
) -> Result<ShellRunResult, String> {
    let output = match command {
        ShellCommand::Help => json!({ "help": shell_help_text() }),
        ShellCommand::Version => json!({ "version": about::GUI_VERSION, "build": about::BUILD_N }),
        ShellCommand::Status => to_json(&app.session().check_install(&app.config()), "status")?,
        ShellCommand::ConfigShow => to_json(&app.config(), "config")?,
        ShellCommand::ConfigSetRepo { path } => {
            let config = app
                .config_store()
                .set_repo_path(path.as_ref().map(PathBuf::from))
                .map_err(|e| e.to_string())?;
            to_json(&config, "config")?
        }
        ShellCommand::ConfigSetLocale { locale } => {
            let config = app
                .config_store()
                .set_locale(locale.as_deref())
                .map_err(|e| e.to_string())?;
            to_json(&config, "config")?
        }
        ShellCommand::ParamsShow => params_output(&app.load_params(), None)?,
        ShellCommand::ParamsNormalized => {
            params_output(&params_codec::normalize(&app.load_params()), None)?
        }
        ShellCommand::ParamsPreview => {
            json!({ "lines": params_codec::serialize(&app.load_params()) })
        }
        ShellCommand::ParamsSet { key, value } => {
            let mut params = app.load_params();
            params.set_field(key, value).map_err(|e| e.to_string())?;
            app.save_params(&params).map_err(|e| e.to_string())?;
            params_output(&params, Some(format!("Set {key} to '{value}'")))?
        }
        ShellCommand::ParamsReset => {
            let params = params_codec::defaults();
            app.save_params(&params).map_err(|e| e.to_string())?;
            params_output(&params, Some("Restored default parameters".to_string()))?
        }
        ShellCommand::ParamsExport { path } => {
            params_codec::export_params_file(Path::new(path), &app.load_params())
                .map_err(|e| e.to_string())?;
            json!({ "ok": true, "path": path })
        }
        ShellCommand::ParamsImport { path } => {
            let params =
                params_codec::import_params_file(Path::new(path)).map_err(|e| e.to_string())?;
            app.save_params(&params).map_err(|e| e.to_string())?;
            params_output(&params, Some(format!("Loaded parameters from '{path}'")))?
        }
        ShellCommand::Setup(step) => execute_setup_step(app, step)?,
        ShellCommand::Run => {
            let status = app.start_run();
            json!({
                "status": status,
                "log": to_json(&app.run_log(), "run log")?,
            })
        }
        ShellCommand::Logs { target } => {
            let entries = match target {
                LogTarget::Run => app.run_log(),
                LogTarget::Setup => app.setup_log(),
            };
            json!({ "entries": to_json(&entries, "log")? })
        }
        ShellCommand::OutDir => json!({ "outDir": app.resolve_out_dir() }),
    };
    Ok(ShellRunResult {
        state_changed: command.is_state_mutating(),
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppPaths, tools::ToolResolver};

    fn app(dir: &Path) -> ViralflowApp {
        ViralflowApp::new(AppPaths::new(dir.join("cfg")), ToolResolver::new(Some(dir.to_path_buf())))
    }

    fn exec(app: &mut ViralflowApp, line: &str) -> Result<ShellRunResult, String> {
        let cmd = parse_shell_line(line)?;
        execute_shell_command(app, &cmd)
    }

    #[test]
    fn parse_params_set_joins_value_words() {
        let cmd = parse_shell_line("params set outDir /runs/my output").expect("parse command");
        assert_eq!(
            cmd,
            ShellCommand::ParamsSet {
                key: "outDir".to_string(),
                value: "/runs/my output".to_string(),
            }
        );
        assert!(cmd.is_state_mutating());
    }

    #[test]
    fn parse_quoted_paths() {
        let cmd = parse_shell_line("params export '/tmp/my runs/x.params'").expect("parse");
        assert_eq!(
            cmd,
            ShellCommand::ParamsExport {
                path: "/tmp/my runs/x.params".to_string()
            }
        );
        assert!(split_shell_words("run \"unterminated").is_err());
        assert!(split_shell_words("   ").is_err());
    }

    #[test]
    fn parse_setup_variants() {
        assert_eq!(
            parse_shell_line("setup update-pangolin data-only").unwrap(),
            ShellCommand::Setup(SetupStep::UpdatePangolin(PangolinUpdateMode::DataOnly))
        );
        assert_eq!(
            parse_shell_line("setup update-pangolin").unwrap(),
            ShellCommand::Setup(SetupStep::UpdatePangolin(PangolinUpdateMode::Full))
        );
        assert!(parse_shell_line("setup update-pangolin weekly").is_err());
        assert!(parse_shell_line("setup add-snpeff onlyone").is_err());
        assert!(parse_shell_line("frobnicate").is_err());
        assert!(parse_shell_line("status now").is_err());
    }

    #[test]
    fn execute_params_set_persists_raw_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        exec(&mut app, "params set virus custom").unwrap();
        exec(&mut app, "params set refGenomeCode NC_045512").unwrap();
        let out = exec(&mut app, "params set virus sars-cov2").unwrap();
        assert!(out.state_changed);
        assert_eq!(out.output["params"]["refGenomeCode"], "NC_045512");

        let normalized = exec(&mut app, "params normalized").unwrap();
        assert!(normalized.output["params"].get("refGenomeCode").is_none());

        let err = exec(&mut app, "params set minLen short").unwrap_err();
        assert!(err.contains("minLen"));
    }

    #[test]
    fn execute_preview_and_export_import() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        exec(&mut app, "params set depth 42").unwrap();
        let preview = exec(&mut app, "params preview").unwrap();
        let lines = preview.output["lines"].as_array().unwrap();
        assert!(lines.iter().any(|l| l == "depth 42"));

        let file = dir.path().join("out.params");
        exec(&mut app, &format!("params export {}", file.display())).unwrap();
        exec(&mut app, "params reset").unwrap();
        assert_eq!(app.load_params().depth, 5);
        exec(&mut app, &format!("params import {}", file.display())).unwrap();
        assert_eq!(app.load_params().depth, 42);
    }

    #[test]
    fn execute_setup_flow_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        assert!(exec(&mut app, "setup build-containers").is_err());
        assert!(!app.setup_log().is_empty());

        exec(&mut app, "setup install-micromamba").unwrap();
        exec(&mut app, "setup install-viralflow").unwrap();
        exec(&mut app, "setup build-containers").unwrap();
        let status = exec(&mut app, "status").unwrap();
        assert_eq!(status.output["containersBuilt"], true);
        assert_eq!(status.output["viralflowVersion"], "MVP-fake-viralflow");

        let logs = exec(&mut app, "logs setup").unwrap();
        let entries = logs.output["entries"].as_array().unwrap();
        assert!(entries.iter().any(|e| e["text"]
            .as_str()
            .unwrap_or_default()
            .contains("Containers (fake) built")));
    }

    #[test]
    fn execute_run_after_clone() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        let clone = exec(&mut app, "setup clone").unwrap();
        let repo = dir.path().join("ViralFlow");
        assert_eq!(clone.output["path"], repo.display().to_string());
        std::fs::create_dir_all(&repo).unwrap();

        let out = exec(&mut app, "run").unwrap();
        assert_eq!(out.output["status"], "success");
        assert!(repo.join(crate::runner::PARAMS_FILE_NAME).exists());
        let logs = exec(&mut app, "logs").unwrap();
        assert_eq!(logs.output["entries"].as_array().unwrap().len(), 2);

        let out_dir = exec(&mut app, "outdir").unwrap();
        assert_eq!(
            out_dir.output["outDir"],
            repo.join("launchDir/output/").display().to_string()
        );
    }

    #[test]
    fn execute_reports_state_change_only_for_mutating_steps() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        assert!(exec(&mut app, "setup clone").unwrap().state_changed);
        assert!(!exec(&mut app, "setup pull").unwrap().state_changed);
        assert!(exec(&mut app, "setup install-micromamba").unwrap().state_changed);
        assert!(exec(&mut app, "setup install-viralflow").unwrap().state_changed);
        assert!(!exec(&mut app, "setup update-pangolin").unwrap().state_changed);
        assert!(!exec(&mut app, "setup add-snpeff org NC_045512.2").unwrap().state_changed);
        assert!(!exec(&mut app, "logs setup").unwrap().state_changed);

        let pull = parse_shell_line("setup pull").unwrap();
        assert_eq!(pull.preview(), "simulate git pull of the ViralFlow repository");
    }

    #[test]
    fn execute_help_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        let help = exec(&mut app, "help").unwrap();
        assert!(help.output["help"].as_str().unwrap().contains("params set"));
        let version = exec(&mut app, "version").unwrap();
        assert_eq!(version.output["version"], about::GUI_VERSION);
    }
}
