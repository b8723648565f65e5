//! phantom-qa CLI: analyze a T1MES phantom scan or run the daily batch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use phantom_qa::{AnalysisConfig, AnalysisStatus, DailyRun, DailyRunConfig, PhantomAnalyzer};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "phantom-qa")]
#[command(about = "Extract per-tube T1 values from nine-tube relaxometry phantom scans")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one DICOM slice; exits 0 when nine tubes were measured, 1 otherwise.
    Analyze(AnalyzeArgs),

    /// Process every QA study waiting in <volume>/incoming.
    Daily(DailyArgs),

    /// Write the default analysis configuration as JSON.
    InitConfig {
        /// Destination file.
        #[arg(long, default_value = "phantom-qa.json")]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct AnalyzeArgs {
    /// Axial DICOM scan of the phantom.
    #[arg(short, long, default_value = "000001.DCM")]
    image: PathBuf,

    /// Also write the smoothed image and measurement mask next to the scan.
    #[arg(short, long)]
    show: bool,

    /// JSON analysis configuration.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct DailyArgs {
    /// QA volume holding incoming/, results/, completed/ and QA.log.
    #[arg(long)]
    volume: PathBuf,

    /// JSON analysis configuration.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_logging(verbose: u8) -> CliResult<()> {
    // A logger or subscriber may already be installed; keep the first one.
    #[cfg(feature = "tracing")]
    {
        let _ = tracing_log::LogTracer::init();
        phantom_qa::core::init_tracing(false, phantom_qa::core::level_for_verbosity(verbose));
        Ok(())
    }
    #[cfg(not(feature = "tracing"))]
    {
        phantom_qa::core::init_with_verbosity(verbose).map_err(|e| e.to_string())?;
        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> CliResult<AnalysisConfig> {
    match path {
        Some(p) => {
            log::info!("loading config {}", p.display());
            Ok(AnalysisConfig::load_json(p)?)
        }
        None => Ok(AnalysisConfig::default()),
    }
}

fn run_analyze(args: &AnalyzeArgs) -> CliResult<ExitCode> {
    if !args.image.is_file() {
        return Err(format!("file {} not found", args.image.display()).into());
    }
    let config = load_config(args.config.as_deref())?;
    let status = PhantomAnalyzer::new(config).analyze(&args.image, args.show)?;
    match &status {
        AnalysisStatus::Success(report) => {
            for m in &report.measurements {
                println!("tube {}: {}", m.tube.index, m.formatted);
            }
            println!(
                "results written to {}",
                report.artifacts.results.display()
            );
        }
        AnalysisStatus::Failure { found } => {
            println!("found {found} tubes - should be 9");
        }
    }
    Ok(ExitCode::from(status.code() as u8))
}

fn run_daily(args: &DailyArgs) -> CliResult<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    let run = DailyRun::new(
        DailyRunConfig::new(&args.volume),
        PhantomAnalyzer::new(config),
    );
    let summary = run.run()?;
    for s in &summary.analyzed {
        println!(
            "{} {}",
            if s.success { "Success" } else { "Fail   " },
            s.path.display()
        );
    }
    for moved in &summary.moved {
        println!("moved {}", moved.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn run(cli: Cli) -> CliResult<ExitCode> {
    init_logging(cli.verbose)?;
    match cli.command {
        Commands::Analyze(args) => run_analyze(&args),
        Commands::Daily(args) => run_daily(&args),
        Commands::InitConfig { out } => {
            AnalysisConfig::default().write_json(&out)?;
            println!("wrote {}", out.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
