use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::{
    env,
    io::{self, BufRead, Write},
    path::PathBuf,
};
use tracing_subscriber::EnvFilter;
use viralflow_gui::{
    about,
    app::ViralflowApp,
    shell::{execute_shell_command, parse_shell_line, parse_shell_tokens, shell_help_text},
};

fn usage() {
    eprintln!(
        "Usage:\n  \
  viralflow_cli --version\n  \
  viralflow_cli [--config-dir PATH] shell\n  \
  viralflow_cli [--config-dir PATH] <shell command>\n\n\
{}",
        shell_help_text()
    );
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Could not serialize JSON output")?;
    println!("{text}");
    Ok(())
}

fn parse_global_config_arg(args: &[String]) -> Result<(Option<PathBuf>, usize)> {
    if args.len() >= 2 && args[1] == "--config-dir" {
        let dir = args
            .get(2)
            .ok_or_else(|| anyhow!("Missing path after --config-dir"))?;
        return Ok((Some(PathBuf::from(dir)), 3));
    }
    Ok((None, 1))
}

/// Keeps one session alive so simulated setup steps build on each other.
fn run_shell_loop(app: &mut ViralflowApp) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "viralflow> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            return Ok(());
        }
        let command = match parse_shell_line(line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        match execute_shell_command(app, &command) {
            Ok(result) => print_json(&result.output)?,
            Err(e) => eprintln!("Could not {}: {e}", command.preview()),
        }
    }
}

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        return Err(anyhow!("Missing command"));
    }
    if args.iter().skip(1).any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(());
    }

    let (config_dir, cmd_idx) = parse_global_config_arg(&args)?;
    if args.len() <= cmd_idx {
        usage();
        return Err(anyhow!("Missing command"));
    }

    let mut app = ViralflowApp::from_env(config_dir);
    if args[cmd_idx] == "shell" {
        return run_shell_loop(&mut app);
    }

    let command = parse_shell_tokens(&args[cmd_idx..]).map_err(|e| anyhow!(e))?;
    let result = execute_shell_command(&mut app, &command)
        .map_err(|e| anyhow!("Could not {}: {e}", command.preview()))?;
    print_json(&result.output)
}
