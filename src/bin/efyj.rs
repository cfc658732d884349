use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use efyj::logger::{init as init_logger, level_from_verbosity, Sink};
use efyj::search::SearchResult;
use efyj::{Error, Repository, Result};

/// Evaluate and repair hierarchical qualitative multi-criteria decision models.
#[derive(Parser, Debug)]
#[command(name = "efyj", version, about)]
struct Cli {
    /// Model file.
    #[arg(short = 'm', long = "model")]
    model: Option<PathBuf>,

    /// Options file.
    #[arg(short = 'o', long = "options")]
    options: Option<PathBuf>,

    /// Adjustment search: K=0 evaluate only, K>0 search up to k=K, K<0 unbounded.
    #[arg(short = 'a', long = "adjustment", allow_hyphen_values = true)]
    adjustment: Option<i64>,

    /// Prediction search (leave-subset-out).
    #[arg(short = 'p', long = "prediction")]
    prediction: bool,

    /// Thread count for adjustment/prediction; bare `-j` means 1.
    #[arg(short = 'j', long = "threads", num_args = 0..=1, default_missing_value = "1")]
    threads: Option<usize>,

    /// Disable reduce mode (search the full position space).
    #[arg(short = 'r', long = "no-reduce")]
    no_reduce: bool,

    /// Extract the model's implied option template to PATH.
    #[arg(short = 'e', long = "extract")]
    extract: Option<PathBuf>,

    /// Dump all enumerated model variants to PATH.
    #[arg(short = 'g', long = "generate")]
    generate: Option<PathBuf>,

    /// Increase verbosity (repeatable).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (repeatable).
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    quiet: u8,
}

fn report_step(result: &SearchResult) -> bool {
    log::info!(
        "k={} kappa={:.4} time={:.3}s evaluations={}",
        result.k,
        result.kappa,
        result.time_seconds,
        result.kappa_evaluations
    );
    true
}

fn report_best(results: &[SearchResult]) {
    if let Some(best) = results.iter().max_by(|a, b| a.kappa.total_cmp(&b.kappa)) {
        log::info!("best: k={} kappa={:.4}", best.k, best.kappa);
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.adjustment.is_some() && cli.prediction {
        return Err(Error::OptionsInconsistent("-a and -p are mutually exclusive".into()));
    }

    let threads = cli.threads.unwrap_or(1);
    let level = level_from_verbosity(cli.verbose, cli.quiet);
    init_logger(Sink::File, level, threads)?;

    let model_path = cli
        .model
        .as_ref()
        .ok_or_else(|| Error::FileError("no model file given (-m)".into()))?;
    let repository = Repository::load_model(model_path)?;

    if let Some(path) = cli.extract.as_ref().or(cli.generate.as_ref()) {
        let template = repository.extract_options()?;
        repository.save_options(path, &template)?;
        return Ok(());
    }

    let options_path = cli
        .options
        .as_ref()
        .ok_or_else(|| Error::FileError("no options file given (-o)".into()))?;
    let options = repository.load_options(options_path)?;
    let reduce_mode = !cli.no_reduce;
    let interrupt = || false;

    if cli.prediction {
        let results = repository.prediction(&options, -1, reduce_mode, threads, report_step, interrupt)?;
        report_best(&results);
        return Ok(());
    }

    if let Some(line_limit) = cli.adjustment {
        if line_limit == 0 {
            let evaluated = repository.evaluate(&options)?;
            log::info!("squared kappa = {:.4}", evaluated.squared_kappa);
            return Ok(());
        }
        let results =
            repository.adjustment(&options, line_limit, reduce_mode, threads, report_step, interrupt)?;
        report_best(&results);
        return Ok(());
    }

    let evaluated = repository.evaluate(&options)?;
    log::info!(
        "squared kappa = {:.4}, linear kappa = {:.4}",
        evaluated.squared_kappa,
        evaluated.linear_kappa
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("efyj: {err}");
            ExitCode::FAILURE
        }
    }
}
