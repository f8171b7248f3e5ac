use anyhow::Context;
use clap::Parser;
use incbuild_core::{
    BuildPlan, CliOverrides, Evaluation, ModuleRegistry, Skipped, StalenessEngine,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_PLAN: &str = "incbuild.yaml";

/// incbuild - incremental build staleness checker
#[derive(Parser, Debug, Clone)]
#[command(name = "incbuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the build plan (YAML, or JSON with a .json extension)
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_PLAN)]
    plan: PathBuf,

    /// Report every module as fresh without checking or cleaning anything
    #[arg(long)]
    no_incremental_build: bool,

    /// Tolerance in milliseconds when comparing resources with their copies
    #[arg(long, value_name = "MILLIS")]
    granularity_ms: Option<u64>,

    /// Log per-file detail
    #[arg(short, long)]
    verbose: bool,

    /// Write a starter build plan to incbuild.yaml
    #[arg(long)]
    init: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            no_incremental_build: self.no_incremental_build.then_some(true),
            granularity_ms: self.granularity_ms,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG refines the filter; --verbose lowers the floor to debug
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    if cli.init {
        return init_plan(Path::new(DEFAULT_PLAN));
    }

    let mut plan = BuildPlan::from_file(&cli.plan)
        .with_context(|| format!("Failed to load build plan {}", cli.plan.display()))?;
    plan.engine.apply_overrides(&cli.overrides());
    debug!("Engine configuration: {:?}", plan.engine);

    let evaluations = run(plan)?;

    let stale = evaluations.iter().filter(|e| e.is_stale()).count();
    for evaluation in &evaluations {
        println!("{}", report_line(evaluation));
    }
    info!(
        "{} module(s) evaluated, {} stale",
        evaluations.len(),
        stale
    );

    Ok(())
}

/// Evaluate every module of the plan, in plan order, within one session
fn run(plan: BuildPlan) -> anyhow::Result<Vec<Evaluation>> {
    let engine = StalenessEngine::new(plan.engine);
    let mut registry = ModuleRegistry::new();
    let mut evaluations = Vec::with_capacity(plan.modules.len());

    for module in &plan.modules {
        let evaluation = engine
            .evaluate(module, &mut registry)
            .with_context(|| format!("Incremental build check failed for {}", module.id))?;
        for path in &evaluation.cleaned {
            debug!("Cleaned {}", path.display());
        }
        evaluations.push(evaluation);
    }

    Ok(evaluations)
}

fn report_line(evaluation: &Evaluation) -> String {
    match evaluation.skipped {
        Some(Skipped::Disabled) => format!("{} fresh (incremental build disabled)", evaluation.module),
        _ => format!("{} {}", evaluation.module, evaluation.verdict),
    }
}

fn init_plan(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }

    let plan = r#"# incbuild build plan
# Modules are evaluated in the order listed; list dependencies first.

engine:
  noIncrementalBuild: false
  granularityMs: 0

modules:
  - group: org.example
    name: core
    version: "1.0.0"
    descriptor: core/module.yaml
    sourceDirectory: core/src/main
    outputDirectory: core/target/classes
    testOutputDirectory: core/target/test-classes
    buildDirectory: core/target
    resources:
      - directory: core/src/resources

  - group: org.example
    name: app
    version: "1.0.0"
    descriptor: app/module.yaml
    sourceDirectory: app/src/main
    outputDirectory: app/target/classes
    testOutputDirectory: app/target/test-classes
    buildDirectory: app/target
    resources:
      - directory: app/src/resources
        excludes:
          - "**/*.bak"
    dependencies:
      - { group: org.example, name: core, version: "1.0.0" }
"#;

    std::fs::write(path, plan).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}
