use crate::config::{self, RunOptions};
use crate::core::processor::{is_affirmative, Operator, Task};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Batch data-quality passes over the product catalog store.",
    long_about = None,
    after_help = "Credentials come from SUPABASE_URL / SUPABASE_ANON_KEY / SUPABASE_SERVICE_ROLE_KEY \
                  (NEXT_PUBLIC_* fallbacks) or from --settings.",
    arg_required_else_help = true
)]
pub struct CliArgs {
    #[arg(short, long, value_enum, help = "Remediation task to run")]
    task: Task,

    #[arg(long, help = "Classify and report without writing anything")]
    dry_run: bool,

    #[arg(short = 'y', long, help = "Do not ask for confirmation before writing")]
    yes: bool,

    #[arg(long, default_value_t = config::DEFAULT_PAGE_SIZE, value_name = "N", help = "Records per page read")]
    page_size: usize,

    #[arg(long, default_value_t = config::MAX_APPLY_CONCUR, value_name = "N", help = "Maximum simultaneous store calls")]
    concurrency: usize,

    #[arg(long, default_value_t = config::DEFAULT_CHUNK_SIZE, value_name = "N", help = "Ids per grouped write")]
    chunk_size: usize,

    #[arg(
        long,
        value_name = "FILE_PATH",
        help = "JSON keyword rules ([{\"target\": ..., \"keywords\": [...]}]) for universal-manufacturers"
    )]
    rules: Option<String>,

    #[arg(long, value_name = "FILE_PATH", help = "JSON settings file (url, api_key, service_key)")]
    settings: Option<String>,
}

impl CliArgs {
    pub fn task(&self) -> Task {
        self.task
    }

    pub fn get_rules_file(&self) -> Option<PathBuf> {
        self.rules.as_deref().map(PathBuf::from)
    }

    pub fn get_settings_file(&self) -> Option<PathBuf> {
        self.settings.as_deref().map(PathBuf::from)
    }

    pub fn get_options(&self) -> AppResult<RunOptions> {
        let options = RunOptions {
            page_size: self.page_size,
            concurrency: self.concurrency,
            chunk_size: self.chunk_size,
            dry_run: self.dry_run,
            assume_yes: self.yes,
        };
        options.validate()?;
        if self.rules.is_some() && self.task != Task::UniversalManufacturers {
            return Err(AppError::Argument(format!(
                "--rules only applies to {}",
                Task::UniversalManufacturers
            )));
        }
        Ok(options)
    }
}

/// Asks on stdout and reads one line from stdin.
pub struct StdinOperator;

#[async_trait]
impl Operator for StdinOperator {
    async fn confirm(&self, question: &str) -> AppResult<bool> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(question.as_bytes()).await?;
        stdout.flush().await?;

        let mut answer = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut answer)
            .await?;
        Ok(is_affirmative(&answer))
    }
}
