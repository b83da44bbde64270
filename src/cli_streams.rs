use anyhow::{Context, Result};
use audioloca_streams::config::{AppConfig, CliConfig, FileConfig};
use audioloca_streams::metrics::{init_metrics, render_metrics};
use audioloca_streams::streams::{demo_entries, NearbyLocation, SeedReport};
use audioloca_streams::{
    NearbyResult, NewTrack, StreamKind, StreamService, SubjectRef, ViewRecord, Visibility,
};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

mod cli_style;

use cli_style::{
    get_prompt, get_styles, print_command_echo, print_empty_list, print_error, print_key_value,
    print_section_header, print_success, print_warning, TableBuilder,
};

use rustyline::{
    completion::Completer, highlight::Highlighter, history::FileHistory, validate::Validator,
    CompletionType, Config, Editor, Helper,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// Path to the streams database file. Created if missing.
    #[clap(value_parser = parse_path)]
    pub db: Option<PathBuf>,

    /// TOML config file. Its values override the flags below.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Decimal precision new locations are written at.
    #[clap(long, default_value_t = 6)]
    pub write_precision: u8,

    /// Bucket precisions tried by nearby queries, in order.
    #[clap(long, value_delimiter = ',', default_values_t = [6, 5, 4, 3, 2, 1])]
    pub search_precisions: Vec<u8>,

    /// Radius of the bounding box step in meters, 0 disables it.
    #[clap(long, default_value_t = 100.0)]
    pub bounding_box_radius_m: f64,

    /// Length of the global ranking returned when nothing nearby is visible.
    #[clap(long, default_value_t = 50)]
    pub global_top_n: usize,

    #[clap(long, default_value_t = 5000)]
    pub busy_timeout_ms: u64,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db.clone(),
            write_precision: self.write_precision,
            search_precisions: self.search_precisions.clone(),
            bounding_box_radius_m: self.bounding_box_radius_m,
            global_top_n: self.global_top_n,
            busy_timeout_ms: self.busy_timeout_ms,
        }
    }
}

#[derive(Parser)]
#[command(styles=get_styles(),name = "")]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Local,
    External,
}

impl From<KindArg> for StreamKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Local => StreamKind::Local,
            KindArg::External => StreamKind::External,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum VisibilityArg {
    Public,
    Private,
}

impl From<VisibilityArg> for Visibility {
    fn from(visibility: VisibilityArg) -> Self {
        match visibility {
            VisibilityArg::Public => Visibility::Public,
            VisibilityArg::Private => Visibility::Private,
        }
    }
}

#[derive(Subcommand)]
enum InnerCommand {
    /// Creates a user with the given handle.
    AddUser { handle: String },

    /// Deletes a user with their albums and tracks. Their play counts stay.
    DeleteUser { user_id: i64 },

    /// Creates an album owned by the given user.
    AddAlbum {
        owner_id: i64,
        name: String,
        #[arg(long)]
        cover: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Creates a track owned by the given user.
    AddTrack {
        owner_id: i64,
        title: String,
        audio_path: String,
        #[arg(long, default_value_t = 0)]
        duration_secs: i64,
        #[arg(long)]
        album_id: Option<i64>,
        #[arg(long)]
        private: bool,
    },

    /// Changes who can see a track in rankings.
    SetVisibility {
        track_id: i64,
        #[arg(value_enum)]
        visibility: VisibilityArg,
    },

    /// Deletes a track and every play count recorded for it.
    DeleteTrack { track_id: i64 },

    /// Records a play. Exactly one of --local or --external must be given.
    #[command(allow_negative_numbers = true)]
    Play {
        user_id: i64,
        latitude: f64,
        longitude: f64,
        #[arg(long)]
        local: Option<i64>,
        #[arg(long)]
        external: Option<String>,
    },

    /// Shows what is popular near a point.
    #[command(allow_negative_numbers = true)]
    Nearby {
        latitude: f64,
        longitude: f64,
        #[arg(long, value_enum, default_value_t = KindArg::Local)]
        kind: KindArg,
    },

    /// Shows the global ranking.
    Top {
        #[arg(value_enum, default_value_t = KindArg::Local)]
        kind: KindArg,
    },

    /// Lists stored locations in the bucket around a point, or within a radius.
    #[command(allow_negative_numbers = true)]
    Locations {
        latitude: f64,
        longitude: f64,
        #[arg(long)]
        precision: Option<u8>,
        #[arg(long)]
        radius_m: Option<f64>,
    },

    /// Imports pre-aggregated play counts from a JSON file.
    Seed {
        #[clap(value_parser = parse_path)]
        path: PathBuf,
    },

    /// Generates and imports synthetic play counts for the given users.
    SeedDemo {
        #[arg(required = true)]
        user_ids: Vec<i64>,
        #[arg(long, default_value_t = 100)]
        count: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Prints the metrics in Prometheus text format.
    Metrics,

    /// Shows the path of the current streams db.
    Where,

    /// Close this program.
    Exit,
}

enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

fn print_entries(entries: &[ViewRecord]) {
    if entries.is_empty() {
        print_empty_list("nothing to show");
        return;
    }
    let mut table = TableBuilder::new(&["#", "track", "by", "plays"]);
    for (rank, entry) in entries.iter().enumerate() {
        let (track, by) = match entry {
            ViewRecord::Local(view) => (
                format!("{} ({})", view.title, view.track_id),
                view.owner_handle.clone().unwrap_or_default(),
            ),
            ViewRecord::External(view) => (view.external_track_id.clone(), String::new()),
        };
        table.add_row(vec![
            (rank + 1).to_string(),
            track,
            by,
            entry.play_count().to_string(),
        ]);
    }
    table.print();
}

fn print_nearby(result: &NearbyResult) {
    print_section_header(&format!("answered by {}", result.resolution));
    print_entries(&result.entries);
}

fn print_locations(locations: &[NearbyLocation]) {
    if locations.is_empty() {
        print_empty_list("no locations");
        return;
    }
    let mut table = TableBuilder::new(&["id", "latitude", "longitude", "precision", "distance"]);
    for nearby in locations {
        let location = &nearby.location;
        table.add_row(vec![
            location.id.to_string(),
            location.latitude.to_string(),
            location.longitude.to_string(),
            location.precision.to_string(),
            format!("{:.1} m", nearby.distance_m),
        ]);
    }
    table.print();
}

fn print_seed_report(report: &SeedReport) {
    print_success(&format!("Applied {} entries", report.applied));
    for rejection in &report.rejected {
        print_warning(&format!(
            "entry {} rejected ({}): {}",
            rejection.index, rejection.code, rejection.reason
        ));
    }
}

fn execute_command(
    line: String,
    service: &StreamService,
    db_path: &str,
) -> CommandExecutionResult {
    if line.is_empty() {
        return CommandExecutionResult::Ok;
    }

    let args =
        shlex::split(&line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect());

    let cli = InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)));

    let command = match cli {
        Ok(cli) => cli.command,
        Err(e) => {
            if e.print().is_err() {
                println!("{}", e);
            }
            return CommandExecutionResult::Ok;
        }
    };
    print_command_echo(&line);
    if let InnerCommand::Exit = command {
        return CommandExecutionResult::Exit;
    }

    let outcome: Result<()> = (|| {
        let catalog = service.catalog();
        match command {
            InnerCommand::AddUser { handle } => {
                let id = catalog.create_user(&handle)?;
                print_success(&format!("Created user {} with id {}", handle, id));
            }
            InnerCommand::DeleteUser { user_id } => {
                if catalog.delete_user(user_id)? {
                    print_success(&format!("Deleted user {}", user_id));
                } else {
                    print_warning(&format!("No user with id {}", user_id));
                }
            }
            InnerCommand::AddAlbum {
                owner_id,
                name,
                cover,
                description,
            } => {
                let id = catalog.create_album(
                    owner_id,
                    &name,
                    cover.as_deref(),
                    description.as_deref(),
                )?;
                print_success(&format!("Created album {} with id {}", name, id));
            }
            InnerCommand::AddTrack {
                owner_id,
                title,
                audio_path,
                duration_secs,
                album_id,
                private,
            } => {
                let visibility = if private {
                    Visibility::Private
                } else {
                    Visibility::Public
                };
                let id = catalog.create_track(&NewTrack {
                    owner_id,
                    album_id,
                    title: title.clone(),
                    audio_path,
                    duration_secs,
                    visibility,
                })?;
                print_success(&format!("Created track {} with id {}", title, id));
            }
            InnerCommand::SetVisibility {
                track_id,
                visibility,
            } => {
                let visibility = Visibility::from(visibility);
                if catalog.set_track_visibility(track_id, visibility)? {
                    print_success(&format!("Track {} is now {}", track_id, visibility.as_str()));
                } else {
                    print_warning(&format!("No track with id {}", track_id));
                }
            }
            InnerCommand::DeleteTrack { track_id } => {
                if catalog.delete_track(track_id)? {
                    print_success(&format!("Deleted track {}", track_id));
                } else {
                    print_warning(&format!("No track with id {}", track_id));
                }
            }
            InnerCommand::Play {
                user_id,
                latitude,
                longitude,
                local,
                external,
            } => {
                let subject = SubjectRef::from_parts(local, external)?;
                let play = service.record_play(user_id, latitude, longitude, &subject)?;
                print_success(&format!(
                    "{} at location {}, play count {}",
                    play.outcome.as_str(),
                    play.location_id,
                    play.play_count
                ));
            }
            InnerCommand::Nearby {
                latitude,
                longitude,
                kind,
            } => {
                let result = service.find_nearby(latitude, longitude, kind.into())?;
                print_nearby(&result);
            }
            InnerCommand::Top { kind } => {
                print_section_header("global ranking");
                print_entries(&service.top_streams(kind.into())?);
            }
            InnerCommand::Locations {
                latitude,
                longitude,
                precision,
                radius_m,
            } => {
                let locations = match radius_m {
                    Some(radius_m) => service.lookup_bounding_box(latitude, longitude, radius_m)?,
                    None => {
                        let precision =
                            precision.unwrap_or(service.config().write_precision);
                        service
                            .lookup_in_bucket(latitude, longitude, precision)?
                            .into_iter()
                            .map(|location| NearbyLocation {
                                distance_m: audioloca_streams::coords::haversine_m(
                                    latitude,
                                    longitude,
                                    location.latitude,
                                    location.longitude,
                                ),
                                location,
                            })
                            .collect()
                    }
                };
                print_locations(&locations);
            }
            InnerCommand::Seed { path } => {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read seed file {:?}", path))?;
                print_seed_report(&service.seed_from_json(&json)?);
            }
            InnerCommand::SeedDemo {
                user_ids,
                count,
                seed,
            } => {
                let mut rng = StdRng::seed_from_u64(seed);
                let entries = demo_entries(&mut rng, &user_ids, count);
                print_seed_report(&service.seed(&entries)?);
            }
            InnerCommand::Metrics => {
                print!("{}", render_metrics());
            }
            InnerCommand::Where => {
                print_key_value("database", db_path);
            }
            InnerCommand::Exit => {}
        }
        Ok(())
    })();

    match outcome {
        Ok(()) => CommandExecutionResult::Ok,
        Err(e) => CommandExecutionResult::Error(format!("{:#}", e)),
    }
}

#[derive(rustyline_derive::Hinter)]
struct CommandHelper {
    commands_names: Vec<String>,
}

impl CommandHelper {
    pub fn new() -> Self {
        let commands_names: Vec<String> = InnerCli::command()
            .get_subcommands()
            .map(|sc| sc.get_name().to_string())
            .collect();

        CommandHelper { commands_names }
    }
}

impl Completer for CommandHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if line.contains(' ') {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .cloned()
            .collect::<Vec<_>>();

        Ok((0, matches))
    }
}

impl Highlighter for CommandHelper {}
impl Validator for CommandHelper {}
impl Helper for CommandHelper {}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;
    init_metrics();

    let cli_args = CliArgs::parse();
    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let app_config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;
    let service = app_config.open_service()?;
    let db_path = app_config.db_path.display().to_string();
    info!("Using streams database at {}", db_path);

    InnerCli::command().print_long_help()?;

    let config = Config::builder()
        .completion_type(CompletionType::List)
        .build();

    let mut rl = Editor::<CommandHelper, FileHistory>::with_config(config)?;
    rl.set_helper(Some(CommandHelper::new()));

    loop {
        match rl.readline(&get_prompt()) {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                match execute_command(line, &service, &db_path) {
                    CommandExecutionResult::Ok => {}
                    CommandExecutionResult::Exit => break,
                    CommandExecutionResult::Error(err) => print_error(&err),
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("CTRL-D: exiting.");
                break;
            }
            Err(e) => {
                println!("Error: {:?}", e);
                break;
            }
        }
    }
    Ok(())
}
