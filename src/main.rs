use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use configuration::{Config, ConfigArgs, init_tracing};
use core_types::registry::parse_filter;
use core_types::{ListRequest, NewShow, Show, ShowFields, ShowId, ShowUpdate, Summary};
use database::{DbRepository, connect, run_migrations};
use std::collections::BTreeSet;

/// The main entry point for the shows catalog.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment and config.toml still apply.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = cli.config.load().context("Failed to load configuration")?;

    // Held until the end of main so buffered log lines are flushed on exit.
    let _log_guard = init_tracing(&config.logging).context("Failed to initialise logging")?;

    let pool = connect(&config.database)
        .await
        .context("Failed to connect to the database")?;

    let repo = DbRepository::new(pool);
    run(cli.command, &repo, &config).await
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A catalog of shows: list, read, create, update and delete.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations.
    Migrate,
    /// Check that the database is reachable.
    Alive,
    /// List shows, filtered, sorted and paginated.
    List(ListArgs),
    /// Show a single show.
    Get {
        show_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Create a show with its cast and listings.
    Create(CreateArgs),
    /// Update a show: given fields are merged, cast and listings are replaced.
    Patch(PatchArgs),
    /// Delete a show and its associations.
    Delete { show_id: String },
    /// Print catalog-wide counters.
    Summary {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ListArgs {
    /// Sort key, repeatable; applied in the order given (e.g. --sort type --sort title).
    #[arg(long = "sort")]
    sort: Vec<String>,

    /// Substring filter as `field=value`, repeatable (e.g. --filter listed_in=Dramas).
    #[arg(long = "filter")]
    filters: Vec<String>,

    #[arg(long)]
    limit: Option<u32>,

    #[arg(long, default_value_t = 0)]
    offset: u32,

    #[arg(long)]
    json: bool,
}

/// Scalar attributes shared by create and patch.
#[derive(Args)]
struct FieldArgs {
    #[arg(long)]
    director: Option<String>,
    #[arg(long)]
    country: Option<String>,
    /// e.g. "September 9, 2019"; defaults to today on create.
    #[arg(long)]
    date_added: Option<String>,
    #[arg(long)]
    release_year: Option<String>,
    #[arg(long)]
    rating: Option<String>,
    #[arg(long)]
    duration: Option<String>,
    #[arg(long)]
    description: Option<String>,

    /// Cast member, repeatable.
    #[arg(long = "cast")]
    cast: Vec<String>,

    /// Listing (genre or category), repeatable.
    #[arg(long = "listed-in")]
    listed_in: Vec<String>,
}

impl FieldArgs {
    fn into_parts(
        self,
        show_type: Option<String>,
        title: Option<String>,
    ) -> (ShowFields, BTreeSet<String>, BTreeSet<String>) {
        let fields = ShowFields {
            show_type: show_type.unwrap_or_default(),
            title: title.unwrap_or_default(),
            director: self.director.unwrap_or_default(),
            country: self.country.unwrap_or_default(),
            date_added: self.date_added.unwrap_or_default(),
            release_year: self.release_year.unwrap_or_default(),
            rating: self.rating.unwrap_or_default(),
            duration: self.duration.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
        };
        (
            fields,
            self.cast.into_iter().collect(),
            self.listed_in.into_iter().collect(),
        )
    }
}

#[derive(Args)]
struct CreateArgs {
    /// Use this identifier instead of generating one.
    #[arg(long)]
    id: Option<String>,
    #[arg(long = "type", value_parser = required_text)]
    show_type: String,
    #[arg(long, value_parser = required_text)]
    title: String,
    #[command(flatten)]
    fields: FieldArgs,
    #[arg(long)]
    json: bool,
}

/// Rejects values that would be stored as an absent field.
fn required_text(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        Err("must not be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

#[derive(Args)]
struct PatchArgs {
    show_id: String,
    #[arg(long = "type")]
    show_type: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[command(flatten)]
    fields: FieldArgs,
    #[arg(long)]
    json: bool,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn run(command: Commands, repo: &DbRepository, config: &Config) -> anyhow::Result<()> {
    match command {
        Commands::Migrate => {
            run_migrations(repo.pool())
                .await
                .context("Failed to run database migrations")?;
            println!("Migrations applied.");
        }
        Commands::Alive => {
            if repo.alive().await {
                println!("alive");
            } else {
                anyhow::bail!("database is not reachable");
            }
        }
        Commands::List(args) => {
            let mut request = ListRequest {
                limit: config.listing.effective_limit(args.limit),
                offset: args.offset,
                ..ListRequest::default()
            };
            if !args.sort.is_empty() {
                request.sort = args.sort;
            }
            for raw in &args.filters {
                let (key, value) = parse_filter(raw)?;
                request.filters.insert(key, value);
            }

            let shows = repo.list(&request).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&shows)?);
            } else {
                println!("{}", shows_table(&shows));
            }
        }
        Commands::Get { show_id, json } => {
            let show = repo.get(&ShowId::new(show_id)).await?;
            print_show(&show, json)?;
        }
        Commands::Create(args) => {
            let (fields, cast, listed_in) = args
                .fields
                .into_parts(Some(args.show_type), Some(args.title));
            let new_show = NewShow {
                show_id: args.id.map(ShowId::new),
                fields,
                cast,
                listed_in,
            };
            let show = repo.create(new_show).await?;
            print_show(&show, args.json)?;
        }
        Commands::Patch(args) => {
            let (fields, cast, listed_in) = args.fields.into_parts(args.show_type, args.title);
            let update = ShowUpdate {
                fields,
                cast,
                listed_in,
            };
            let show = repo.patch(&ShowId::new(args.show_id), update).await?;
            print_show(&show, args.json)?;
        }
        Commands::Delete { show_id } => {
            repo.delete(&ShowId::new(show_id.clone())).await?;
            println!("Deleted {show_id}.");
        }
        Commands::Summary { json } => {
            let summary = repo.summarize().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", summary_table(&summary));
            }
        }
    }
    Ok(())
}

fn print_show(show: &Show, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(show)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Field", "Value"]);
    let fields = &show.fields;
    let rows = [
        ("show_id", show.show_id.as_str()),
        ("type", fields.show_type.as_str()),
        ("title", fields.title.as_str()),
        ("director", fields.director.as_str()),
        ("country", fields.country.as_str()),
        ("date_added", fields.date_added.as_str()),
        ("release_year", fields.release_year.as_str()),
        ("rating", fields.rating.as_str()),
        ("duration", fields.duration.as_str()),
        ("description", fields.description.as_str()),
        ("uri", show.uri.as_str()),
    ];
    for (name, value) in rows {
        table.add_row(vec![name.to_string(), value.to_string()]);
    }
    table.add_row(vec!["cast".to_string(), show.cast.join(", ")]);
    table.add_row(vec!["listed_in".to_string(), show.listed_in.join(", ")]);
    println!("{table}");
    Ok(())
}

fn shows_table(shows: &[Show]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "ID", "Type", "Title", "Country", "Year", "Rating", "Listed In",
    ]);
    for show in shows {
        table.add_row(vec![
            show.show_id.to_string(),
            show.fields.show_type.clone(),
            show.fields.title.clone(),
            show.fields.country.clone(),
            show.fields.release_year.clone(),
            show.fields.rating.clone(),
            show.listed_in.join(", "),
        ]);
    }
    table
}

fn summary_table(summary: &Summary) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Group", "Value", "Shows"]);
    table.add_row(vec!["total".to_string(), String::new(), summary.total.to_string()]);
    for (show_type, count) in &summary.total_by_type {
        table.add_row(vec!["type".to_string(), show_type.clone(), count.to_string()]);
    }
    for (listing, count) in &summary.total_by_listing {
        table.add_row(vec!["listed_in".to_string(), listing.clone(), count.to_string()]);
    }
    table
}
