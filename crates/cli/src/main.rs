use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use meditache_core::constants::ATTACHMENTS_COLLECTION;
use meditache_core::{
    ActorId, CoreConfig, FileStore, Intervention, InterventionFilter, InterventionPatch,
    InterventionService, InterventionStatus, InterventionType, InterventionTypeService,
    NewIntervention, NonEmptyText, Priority, ShardableUuid,
};
use meditache_files::FilesService;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "meditache")]
#[command(about = "Meditache intervention scheduling CLI")]
struct Cli {
    /// Record storage directory
    #[arg(long, global = true, env = "MEDITACHE_DATA_DIR")]
    data_dir: Option<String>,

    /// Upload storage directory
    #[arg(long, global = true, env = "MEDITACHE_UPLOADS_DIR")]
    uploads_dir: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Intervention-type nomenclature
    #[command(subcommand)]
    Types(TypeCommands),
    /// Scheduled interventions
    #[command(subcommand)]
    Interventions(InterventionCommands),
}

#[derive(Subcommand)]
enum TypeCommands {
    /// List active entries, global first
    List {
        /// Case-insensitive name fragment
        #[arg(long)]
        search: Option<String>,
        /// Include this doctor's own entries
        #[arg(long)]
        doctor: Option<ActorId>,
    },
    /// Create an entry, or print the existing one with the same name
    Create {
        name: String,
        /// Owning doctor; omit for a global entry
        #[arg(long)]
        doctor: Option<ActorId>,
    },
}

#[derive(Subcommand)]
enum InterventionCommands {
    /// Schedule a new intervention
    Create {
        #[arg(long)]
        doctor: ActorId,
        #[arg(long)]
        title: NonEmptyText,
        /// Scheduled start (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,
        /// Scheduled end (RFC 3339)
        #[arg(long)]
        end: Option<DateTime<Utc>>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        status: Option<InterventionStatus>,
        #[arg(long)]
        notes: Option<String>,
        /// Nomenclature entry id
        #[arg(long)]
        type_id: Option<ShardableUuid>,
        /// Recorded as the creator
        #[arg(long, default_value = "cli")]
        actor: ActorId,
    },
    /// List interventions by scheduled start
    List {
        #[arg(long)]
        doctor: Option<ActorId>,
        #[arg(long)]
        status: Option<InterventionStatus>,
        #[arg(long)]
        priority: Option<Priority>,
        /// Earliest scheduled start, inclusive (RFC 3339)
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        /// Latest scheduled start, inclusive (RFC 3339)
        #[arg(long)]
        to: Option<DateTime<Utc>>,
        /// Print JSON instead of one line per intervention
        #[arg(long)]
        json: bool,
    },
    /// Interventions starting within the next days, any status
    Upcoming {
        /// Look-ahead in days (default 7)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Print one intervention as JSON
    Show { id: ShardableUuid },
    /// Replace an intervention's status
    SetStatus {
        id: ShardableUuid,
        status: InterventionStatus,
    },
    /// Store files and append them to the report attachments
    Attach {
        id: ShardableUuid,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete an intervention
    Remove { id: ShardableUuid },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'meditache --help' for commands");
        return Ok(());
    };

    let cfg = CoreConfig::from_env_values(cli.data_dir, cli.uploads_dir)?;
    cfg.ensure_directories()?;
    let store = Arc::new(FileStore::open(cfg.data_dir())?);

    match command {
        Commands::Types(cmd) => run_types(InterventionTypeService::new(store), cmd)?,
        Commands::Interventions(cmd) => {
            run_interventions(InterventionService::new(store), &cfg, cmd)?
        }
    }

    Ok(())
}

fn run_types(
    service: InterventionTypeService<FileStore>,
    cmd: TypeCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        TypeCommands::List { search, doctor } => {
            let entries = service.list(search.as_deref(), doctor.as_ref())?;
            if entries.is_empty() {
                println!("No intervention types found.");
            }
            for entry in &entries {
                print_type(entry);
            }
        }
        TypeCommands::Create { name, doctor } => {
            let entry = service.create(&name, doctor)?;
            print_type(&entry);
        }
    }
    Ok(())
}

fn run_interventions(
    service: InterventionService<FileStore>,
    cfg: &CoreConfig,
    cmd: InterventionCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        InterventionCommands::Create {
            doctor,
            title,
            start,
            end,
            priority,
            status,
            notes,
            type_id,
            actor,
        } => {
            let new = NewIntervention {
                doctor_id: doctor,
                intervention_type_id: type_id,
                title,
                notes,
                scheduled_start: start,
                scheduled_end: end,
                priority,
                status,
            };
            let created = service.create(new, actor)?;
            println!("Created intervention with ID: {}", created.id);
        }
        InterventionCommands::List {
            doctor,
            status,
            priority,
            from,
            to,
            json,
        } => {
            let filter = InterventionFilter {
                doctor_id: doctor,
                status,
                priority,
                from,
                to,
            };
            let found = service.find_all(&filter)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                print_interventions(&found);
            }
        }
        InterventionCommands::Upcoming { days } => {
            print_interventions(&service.upcoming(days)?);
        }
        InterventionCommands::Show { id } => {
            let found = service.find_one(&id)?;
            println!("{}", serde_json::to_string_pretty(&found)?);
        }
        InterventionCommands::SetStatus { id, status } => {
            let updated = service.update(&id, &InterventionPatch::status(status))?;
            println!("Intervention {} is now {}", updated.id, updated.status);
        }
        InterventionCommands::Attach { id, files } => {
            // Fail before writing any blob if the intervention is gone.
            service.find_one(&id)?;

            let uploads = FilesService::new(cfg.uploads_dir(), ATTACHMENTS_COLLECTION)?;
            let mut references = Vec::with_capacity(files.len());
            for path in &files {
                let stored = uploads.add(path)?;
                println!("Stored {} as {}", path.display(), stored.reference);
                references.push(stored.reference);
            }

            let updated = service.append_report_attachments(&id, references)?;
            println!(
                "Intervention {} has {} attachment(s)",
                updated.id,
                updated.report_attachments.len()
            );
        }
        InterventionCommands::Remove { id } => {
            let removed = service.remove(&id)?;
            println!("Removed intervention {} ({})", removed.id, removed.title);
        }
    }
    Ok(())
}

fn print_type(entry: &InterventionType) {
    let owner = entry
        .owner_doctor_id
        .as_ref()
        .map(ActorId::as_str)
        .unwrap_or("global");
    println!("ID: {}, Name: {}, Owner: {}", entry.id, entry.name, owner);
}

fn print_interventions(found: &[Intervention]) {
    if found.is_empty() {
        println!("No interventions found.");
        return;
    }
    for i in found {
        println!(
            "{}  {}  {:<11}  {:<6}  {}  (doctor {})",
            i.id,
            i.scheduled_start.to_rfc3339(),
            i.status,
            i.priority,
            i.title,
            i.doctor_id
        );
    }
}
