use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use dose_core::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "dosectl")]
#[command(about = "Medication dose schedule and taken log", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override care plan file
    #[arg(long, global = true)]
    care_plan: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Acting caregiver user id
    #[arg(long, global = true)]
    user: Option<String>,
}

#[derive(clap::Args)]
struct WindowArgs {
    /// Window start (RFC 3339), defaults to now
    #[arg(long)]
    from: Option<DateTime<Utc>>,

    /// Window end (RFC 3339, exclusive), defaults to start + window length
    #[arg(long)]
    to: Option<DateTime<Utc>>,

    /// Window length in days when --to is not given
    #[arg(long)]
    days: Option<i64>,

    /// Include schedules of inactive medications (up to their cutoff)
    #[arg(long)]
    include_inactive: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List doses for a recipient
    List {
        #[arg(long)]
        recipient: String,

        #[command(flatten)]
        window: WindowArgs,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Mark a dose as taken
    Take {
        /// Dose id as printed by `list`
        dose_id: String,

        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Append a recipient's doses to a CSV file
    Export {
        #[arg(long)]
        recipient: String,

        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// Validate the care plan
    Check,

    /// Compact the taken log
    Compact,
}

fn main() -> ExitCode {
    // Initialize logging
    dose_core::logging::init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn exit_code(error: &Error) -> u8 {
    match error.class() {
        ErrorClass::Internal => 1,
        ErrorClass::InvalidInput => 2,
        ErrorClass::NotFound => 3,
        ErrorClass::Conflict => 4,
    }
}

/// Resolved file locations
struct Paths {
    care_plan: PathBuf,
    taken_log: PathBuf,
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    let paths = Paths {
        care_plan: cli
            .care_plan
            .clone()
            .unwrap_or_else(|| config.data.care_plan_path(&data_dir)),
        taken_log: data_dir.join("taken.jsonl"),
    };
    tracing::debug!(
        "Care plan {:?}, taken log {:?}",
        paths.care_plan,
        paths.taken_log
    );

    match cli.command {
        Commands::List {
            ref recipient,
            ref window,
            json,
        } => {
            let user = acting_user(&cli, &config)?;
            let doses = list_doses(&paths, &config, &user, recipient, window)?;
            print_doses(&doses, json)
        }
        Commands::Take { ref dose_id, json } => {
            let user = acting_user(&cli, &config)?;
            cmd_take(&paths, &config, &user, dose_id, json)
        }
        Commands::Export {
            ref recipient,
            ref out,
            ref window,
        } => {
            let user = acting_user(&cli, &config)?;
            let doses = list_doses(&paths, &config, &user, recipient, window)?;
            let count = export_doses_csv(&doses, out)?;
            println!("✓ Exported {} doses", count);
            println!("  CSV: {}", out.display());
            Ok(())
        }
        Commands::Check => cmd_check(&paths.care_plan),
        Commands::Compact => cmd_compact(&paths.taken_log),
    }
}

fn acting_user(cli: &Cli, config: &Config) -> Result<String> {
    cli.user
        .clone()
        .or_else(|| config.caregiver.user_id.clone())
        .ok_or_else(|| {
            Error::Config("No user given; pass --user or set [caregiver] user_id".into())
        })
}

fn build_service<'a>(
    plan: &'a CarePlan,
    store: &'a JsonlTakenStore,
    config: &Config,
    days: Option<i64>,
) -> Result<DoseService<&'a CarePlan, &'a CarePlan, &'a JsonlTakenStore>> {
    let days = days.unwrap_or(config.schedule.window_days);
    if days < 1 {
        return Err(Error::Config(format!("--days must be at least 1, got {}", days)));
    }

    Ok(DoseService::new(plan, plan, store)
        .with_default_timezone(config.schedule.timezone()?)
        .with_window_length(Duration::days(days)))
}

fn list_doses(
    paths: &Paths,
    config: &Config,
    user: &str,
    recipient: &str,
    window: &WindowArgs,
) -> Result<Vec<DoseOccurrence>> {
    let plan = CarePlan::load(&paths.care_plan)?;
    let store = JsonlTakenStore::new(&paths.taken_log);
    let service = build_service(&plan, &store, config, window.days)?;

    service.list_upcoming(
        user,
        recipient,
        DoseWindow {
            from: window.from,
            to: window.to,
        },
        window.include_inactive,
    )
}

fn cmd_take(paths: &Paths, config: &Config, user: &str, dose_id: &str, json: bool) -> Result<()> {
    let plan = CarePlan::load(&paths.care_plan)?;
    let store = JsonlTakenStore::new(&paths.taken_log);
    let service = build_service(&plan, &store, config, None)?;

    let dose = service.mark_taken(user, &DoseId::from(dose_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&dose)?);
        return Ok(());
    }

    println!("✓ Dose taken");
    println!("  {} at {}", dose.medication_name, format_time(dose.scheduled_for));
    if let (Some(at), Some(by)) = (dose.taken_at, dose.taken_by_user_id.as_deref()) {
        println!("  Taken {} by {}", format_time(at), by);
    }
    Ok(())
}

fn cmd_check(care_plan: &Path) -> Result<()> {
    let plan = CarePlan::load(care_plan)?;
    let errors = plan.validate();

    if !errors.is_empty() {
        eprintln!("Care plan validation errors:");
        for error in &errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CarePlan(format!("{} problems found", errors.len())));
    }

    println!(
        "✓ Care plan OK: {} medications, {} schedules",
        plan.medications.len(),
        plan.schedules.len()
    );
    Ok(())
}

fn cmd_compact(taken_log: &Path) -> Result<()> {
    if !taken_log.exists() {
        println!("No taken log found - nothing to compact.");
        return Ok(());
    }

    let kept = JsonlTakenStore::new(taken_log).compact()?;
    println!("✓ Compacted taken log, {} records kept", kept);
    Ok(())
}

fn print_doses(doses: &[DoseOccurrence], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(doses)?);
        return Ok(());
    }

    if doses.is_empty() {
        println!("No doses in this window.");
        return Ok(());
    }

    for dose in doses {
        let status = match dose.status {
            DoseStatus::Scheduled => "scheduled",
            DoseStatus::Taken => "taken",
        };
        println!(
            "{}  {:<9}  {:<24}  {}",
            format_time(dose.scheduled_for),
            status,
            dose.medication_name,
            dose.dose_id
        );
    }
    Ok(())
}

fn format_time(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%MZ").to_string()
}
