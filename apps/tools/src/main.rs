use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use schedule_api::{
    add_entry, delete_entry, list_all_entries, list_locations, update_entry, ApiContext,
};
use shared::domain::{EntryId, EntryUpdate, NewScheduleEntry, ScheduleEntry, Weekday};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/schedule.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every schedule entry.
    List,
    /// Print the distinct location names.
    Locations,
    Add {
        #[arg(long)]
        location: String,
        #[arg(long)]
        day: Weekday,
        #[arg(long)]
        time_slot: String,
        #[arg(long)]
        faculty: String,
        #[arg(long)]
        batch: Option<String>,
        #[arg(long)]
        capacity: i64,
    },
    Edit {
        id: i64,
        #[arg(long)]
        faculty: Option<String>,
        #[arg(long, conflicts_with = "clear_batch")]
        batch: Option<String>,
        #[arg(long)]
        clear_batch: bool,
    },
    Delete {
        id: i64,
    },
    /// Insert the demo timetable.
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    let ctx = ApiContext::new(storage.clone());
    match cli.command {
        Command::List => {
            for entry in list_all_entries(&ctx).await? {
                print_entry(&entry);
            }
        }
        Command::Locations => {
            for location in list_locations(&ctx).await? {
                println!("{location}");
            }
        }
        Command::Add {
            location,
            day,
            time_slot,
            faculty,
            batch,
            capacity,
        } => {
            let created = add_entry(
                &ctx,
                NewScheduleEntry {
                    location,
                    day,
                    time_slot,
                    faculty,
                    batch,
                    capacity,
                },
            )
            .await?;
            println!("created entry id={}", created.id);
        }
        Command::Edit {
            id,
            faculty,
            batch,
            clear_batch,
        } => {
            let batch = if clear_batch { Some(None) } else { batch.map(Some) };
            let update = EntryUpdate { faculty, batch };
            if update.is_empty() {
                bail!("nothing to edit; pass --faculty, --batch or --clear-batch");
            }
            let updated = update_entry(&ctx, EntryId(id), update).await?;
            print_entry(&updated);
        }
        Command::Delete { id } => {
            delete_entry(&ctx, EntryId(id)).await?;
            println!("deleted entry id={id}");
        }
        Command::Seed => {
            let inserted = storage.seed_demo_rows().await?;
            info!(inserted, "seeded demo timetable");
            println!("inserted {inserted} rows");
        }
    }

    Ok(())
}

fn print_entry(entry: &ScheduleEntry) {
    println!(
        "{:>4}  {:<14} {:<10} {:<8} {:<16} {:<8} {}",
        entry.id.0,
        entry.location,
        entry.day.as_str(),
        entry.time_slot,
        entry.faculty,
        entry.batch.as_deref().unwrap_or("-"),
        entry.capacity
    );
}
