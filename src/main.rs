use catalog_fix::api::client::StoreClient;
use catalog_fix::classify::keyword::KeywordClassifier;
use catalog_fix::cli::{CliArgs, StdinOperator};
use catalog_fix::config::Settings;
use catalog_fix::core::processor::{self, AutoApprove, Operator};
use catalog_fix::error::{AppError, AppResult};
use catalog_fix::logging::{log, setup_logging, LogLevel};
use clap::{CommandFactory, Parser};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::runtime::Builder;

fn main() -> ExitCode {
    setup_logging();

    let cli_args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if e.use_stderr() {
                log(LogLevel::Error, &format!("CLI Argument Error: {}", e));
                let _ = CliArgs::command().print_help();
                return ExitCode::from(2);
            }
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    let runtime = match Builder::new_multi_thread()
        .enable_all()
        .thread_name("catalog-worker")
        .worker_threads(num_cpus::get())
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log(
                LogLevel::Error,
                &format!("FATAL: Failed to build Tokio runtime: {}", e),
            );
            return ExitCode::FAILURE;
        }
    };

    let main_result: AppResult<i32> = runtime.block_on(run(cli_args));

    match main_result {
        Ok(exit_code) => ExitCode::from(exit_code as u8),
        Err(e) => {
            log(LogLevel::Error, &format!("FATAL: {}", e));
            if e.is_remote() {
                log(
                    LogLevel::Info,
                    "The store could not be read; check the URL, keys and network, then rerun.",
                );
            }
            if matches!(e, AppError::Argument(_)) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(args: CliArgs) -> AppResult<i32> {
    let options = args.get_options()?;

    let settings = match args.get_settings_file() {
        Some(path) => Settings::from_file(&path).await?,
        None => Settings::from_env()?,
    };

    let keyword_rules = match args.get_rules_file() {
        Some(path) => {
            let classifier = KeywordClassifier::from_rules_file(&path).await?;
            log(
                LogLevel::Info,
                &format!(
                    "Loaded {} keyword rule(s) from {}",
                    classifier.rules().len(),
                    path.display()
                ),
            );
            Some(classifier)
        }
        None => None,
    };

    let operator: Box<dyn Operator> = if options.assume_yes {
        Box::new(AutoApprove)
    } else {
        Box::new(StdinOperator)
    };

    let store = Arc::new(StoreClient::new(&settings)?);
    let report =
        processor::run(args.task(), store, options, keyword_rules, operator.as_ref()).await?;

    report.print_summary();
    Ok(report.exit_code())
}
