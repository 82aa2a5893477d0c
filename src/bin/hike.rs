use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use hike::config::HikeConfig;

#[derive(Parser)]
#[command(name = "hike", about = "Compiles a hikefile into a minimal ordered plan and executes it")]
struct Cli {
    /// Path to the hikefile to load (default: search parent directories
    /// for the configured default hikefile name)
    #[arg(short = 'f', long)]
    hikefile: Option<PathBuf>,

    /// Build the plan and print it without performing any step
    #[arg(short = 'p', long)]
    pretend: bool,

    /// Print the compiled spec's goals and artifacts, then exit
    #[arg(long)]
    dump: bool,

    /// Name to give the top-level project (artifacts are keyed by
    /// `project::name`)
    #[arg(long, default_value = "root")]
    project: String,

    /// Goals to attain (default: the configured default goal)
    goals: Vec<String>,
}

fn find_hikefile(start: &Path, name: &str) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        let candidate = d.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = d.parent();
    }
    None
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = HikeConfig::load().context("failed to load hike.toml configuration")?;

    let hikefile_name = config.default_hikefile.clone();
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let hikefile_path = match &cli.hikefile {
        Some(p) => p.clone(),
        None => find_hikefile(&cwd, &hikefile_name)
            .with_context(|| format!("could not find a '{hikefile_name}' in '{}' or any parent directory", cwd.display()))?,
    };

    let state = hike::load_spec(&hikefile_path, &cli.project).map_err(|e| {
        let mut buf = Vec::new();
        let _ = e.print_to(&mut buf);
        anyhow::anyhow!(String::from_utf8_lossy(&buf).into_owned())
    })?;

    if cli.dump {
        println!("goals:");
        for name in state.goal_names() {
            println!("  {name}");
        }
        println!("artifacts:");
        for name in state.artifact_names() {
            println!("  {name}");
        }
        return Ok(());
    }

    let goals: Vec<String> = if cli.goals.is_empty() { vec![config.default_goal.clone()] } else { cli.goals };

    for goal_name in &goals {
        let plan = hike::plan_goal(&state, goal_name).map_err(print_build_error)?;

        if cli.pretend {
            for step in plan.steps() {
                println!("{}", step.simple_descr());
            }
            continue;
        }

        hike::execute_plan(&plan).map_err(print_build_error)?;
    }

    Ok(())
}

fn print_build_error(e: hike::error::BuildError) -> anyhow::Error {
    let mut buf = Vec::new();
    let _ = e.print_to(&mut buf);
    anyhow::anyhow!(String::from_utf8_lossy(&buf).into_owned())
}
