use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, level_filters::LevelFilter};

use crate::{
    config::{Config, GOOGLE_SHEETS_API_KEY_VAR, NOTION_TOKEN_VAR, ULTRAHUMAN_R1_TOKEN_VAR},
    meditations::{
        create_monthly_meditations_key_result, create_monthly_observations_key_result,
        meditation_report, save_meditation_aggregates_to_vault,
        set_current_value_of_meditations_key_result, set_current_value_of_observations_key_result,
    },
    notion::client::NotionClient,
    sheets::client::GoogleSheetsClient,
    sleep::{aggregate::save_sleep_stats_to_vault, client::UltrahumanClient, ingest::save_insights_to_vault},
    utils::{
        clock::{Clock, DefaultClock},
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
        time::Period,
    },
    workouts::{
        create_monthly_workout_key_result, save_workout_stats_to_vault,
        set_current_value_of_workout_key_result,
    },
};

#[derive(Parser, Debug)]
#[command(name = "Lifevault", version, long_about = None)]
#[command(about = "Keeps the life tracking vault and the monthly key results up to date", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        help = "Toml config file. Tokens are taken from NOTION_TOKEN, GOOGLE_SHEETS_API_KEY and ULTRAHUMAN_R1_TOKEN"
    )]
    config: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct PeriodArgs {
    #[arg(short, long, help = "Year to run for. Defaults to the current year")]
    year: Option<i32>,
    #[arg(
        short,
        long,
        value_parser = clap::value_parser!(u32).range(1..=12),
        help = "Month to run for, 1 to 12. Defaults to the current month"
    )]
    month: Option<u32>,
}

impl PeriodArgs {
    fn resolve(self, clock: &dyn Clock) -> Period {
        Period::resolve(self.year, self.month, clock)
    }
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Write this month's workout count into its key result")]
    SetCurrentValueOfWorkoutKeyResult {
        #[command(flatten)]
        period: PeriodArgs,
    },
    #[command(about = "Write this month's meditation count into its key result")]
    SetCurrentValueOfMeditationsKeyResult {
        #[command(flatten)]
        period: PeriodArgs,
    },
    #[command(about = "Write this month's observation count into its key result")]
    SetCurrentValueOfObservationsKeyResult {
        #[command(flatten)]
        period: PeriodArgs,
    },
    #[command(about = "Close last month's workout key result and open a new one")]
    CreateMonthlyWorkoutKeyResult {
        #[command(flatten)]
        period: PeriodArgs,
    },
    #[command(about = "Close last month's meditation key result and open a new one")]
    CreateMonthlyMeditationsKeyResult {
        #[command(flatten)]
        period: PeriodArgs,
    },
    #[command(about = "Close last month's observation key result and open a new one")]
    CreateMonthlyObservationsKeyResult {
        #[command(flatten)]
        period: PeriodArgs,
    },
    #[command(about = "Summarise the workout spreadsheet into the vault")]
    SaveWorkoutStatsToVault,
    #[command(about = "Fetch the week after the last saved one from the sleep ring")]
    SaveNextSleepStatsToVault,
    #[command(about = "Roll saved sleep weeks up into monthly stats")]
    SaveSleepAggregateStatsToVault,
    #[command(
        about = "Merge a month of meditation and observation stats into the vault. Meant to run daily"
    )]
    SaveMonthlyMeditationAggregatesToVault {
        #[command(flatten)]
        period: PeriodArgs,
    },
    #[command(about = "Print a month's meditation summary with chart links")]
    MeditationReport {
        #[command(flatten)]
        period: PeriodArgs,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(
        CLI_PREFIX,
        &create_application_default_path()?,
        logging_level,
        args.log,
    )?;

    let config = Config::load(args.config.as_deref())?;
    info!("Running {:?}", args.commands);
    run_command(args.commands, &config, &DefaultClock).await
}

fn require_token(token: &str, var: &str) -> Result<()> {
    ensure!(!token.is_empty(), "{var} is not set");
    Ok(())
}

fn notion(config: &Config) -> Result<NotionClient> {
    require_token(&config.notion_token, NOTION_TOKEN_VAR)?;
    Ok(NotionClient::new(config.notion_token.as_str()))
}

fn sheets(config: &Config) -> Result<GoogleSheetsClient> {
    require_token(&config.google_sheets_api_key, GOOGLE_SHEETS_API_KEY_VAR)?;
    Ok(GoogleSheetsClient::new(config.google_sheets_api_key.as_str()))
}

fn print(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_command(command: Commands, config: &Config, clock: &dyn Clock) -> Result<()> {
    match command {
        Commands::SetCurrentValueOfWorkoutKeyResult { period } => print(
            &set_current_value_of_workout_key_result(
                &notion(config)?,
                &sheets(config)?,
                config,
                clock,
                period.resolve(clock),
            )
            .await?,
        ),
        Commands::SetCurrentValueOfMeditationsKeyResult { period } => print(
            &set_current_value_of_meditations_key_result(
                &notion(config)?,
                config,
                period.resolve(clock),
            )
            .await?,
        ),
        Commands::SetCurrentValueOfObservationsKeyResult { period } => print(
            &set_current_value_of_observations_key_result(
                &notion(config)?,
                config,
                period.resolve(clock),
            )
            .await?,
        ),
        Commands::CreateMonthlyWorkoutKeyResult { period } => print(
            &create_monthly_workout_key_result(&notion(config)?, config, period.resolve(clock))
                .await?,
        ),
        Commands::CreateMonthlyMeditationsKeyResult { period } => print(
            &create_monthly_meditations_key_result(&notion(config)?, config, period.resolve(clock))
                .await?,
        ),
        Commands::CreateMonthlyObservationsKeyResult { period } => print(
            &create_monthly_observations_key_result(
                &notion(config)?,
                config,
                period.resolve(clock),
            )
            .await?,
        ),
        Commands::SaveWorkoutStatsToVault => {
            print(&save_workout_stats_to_vault(&sheets(config)?, config, clock).await?)
        }
        Commands::SaveNextSleepStatsToVault => {
            require_token(&config.ultrahuman_token, ULTRAHUMAN_R1_TOKEN_VAR)?;
            let api = UltrahumanClient::new(config.ultrahuman_api_base.as_str());
            print(&save_insights_to_vault(&api, config).await?)
        }
        Commands::SaveSleepAggregateStatsToVault => {
            print(&save_sleep_stats_to_vault(config, clock).await?)
        }
        Commands::SaveMonthlyMeditationAggregatesToVault { period } => print(
            &save_meditation_aggregates_to_vault(
                &notion(config)?,
                config,
                clock,
                period.resolve(clock),
            )
            .await?,
        ),
        Commands::MeditationReport { period } => {
            let report =
                meditation_report(&notion(config)?, config, clock, period.resolve(clock)).await?;
            println!("{}", report.message);
            Ok(())
        }
    }
}
