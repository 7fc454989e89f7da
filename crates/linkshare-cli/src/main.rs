//! Linkshare CLI
//!
//! Command-line interface for linkshare - shared links, tags and
//! recommendations.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use linkshare_core::{
    Config, CoreError, Database, ErrorKind, NewResource, Privacy, ResourceService,
};

mod commands;
mod output;

use commands::resource::UpdateRequest;
use output::{Output, OutputFormat};

/// Log filter used when RUST_LOG is not set
const DEFAULT_LOG_FILTER: &str = "linkshare_core=warn,linkshare_cli=warn";

#[derive(Parser)]
#[command(name = "linkshare")]
#[command(about = "Linkshare - share, tag and recommend links")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - print ids only
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file to use instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Act as this user
    #[arg(long = "as", global = true, value_name = "USER_ID")]
    as_user: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users and follows
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Manage shared resources
    Resource {
        #[command(subcommand)]
        command: ResourceCommands,
    },
    /// Manage your collections
    Collection {
        #[command(subcommand)]
        command: CollectionCommands,
    },
    /// List all tags
    Tags,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register a user
    Add {
        username: String,
        email: String,
    },
    /// Show a user
    Show {
        /// User ID
        id: i64,
    },
    /// Follow another user (requires --as)
    Follow {
        /// User ID to follow
        id: i64,
    },
}

#[derive(Subcommand)]
enum ResourceCommands {
    /// Share a new resource
    #[command(alias = "add")]
    Create {
        /// Resource title
        title: String,
        /// URL to share
        link: String,
        /// Resource type (site, video, article, ...)
        #[arg(short = 'T', long = "type", default_value = "site")]
        kind: String,
        /// Who may see it: public, owner or followers
        #[arg(short, long, default_value_t = Privacy::Public)]
        privacy: Privacy,
        /// Tags to attach
        #[arg(short, long)]
        tag: Vec<String>,
    },
    /// Change fields and tags of a resource you own
    Update {
        /// Resource ID
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        link: Option<String>,
        #[arg(long = "type")]
        kind: Option<String>,
        #[arg(long)]
        privacy: Option<Privacy>,
        /// JSON object of fields, e.g. '{"title": "New"}'
        #[arg(long, value_name = "JSON")]
        fields: Option<String>,
        /// Tags to attach
        #[arg(long)]
        add_tag: Vec<String>,
        /// Tags to detach
        #[arg(long)]
        remove_tag: Vec<String>,
    },
    /// Delete a resource you own
    #[command(alias = "rm")]
    Delete {
        /// Resource ID
        id: i64,
    },
    /// Recommend a resource
    Recommend {
        /// Resource ID
        id: i64,
    },
    /// Show a resource
    Show {
        /// Resource ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum CollectionCommands {
    /// Create a collection
    Create {
        /// Collection name
        name: String,
    },
    /// List your collections
    #[command(alias = "ls")]
    List,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, busy_timeout_ms, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Exit status for a failed command
///
/// Core errors get one code per kind so scripts can tell a retryable
/// timeout from a refusal. Anything else exits with 1.
fn exit_code(err: &anyhow::Error) -> u8 {
    let Some(core) = err.downcast_ref::<CoreError>() else {
        return 1;
    };

    match core.kind() {
        ErrorKind::Validation => 2,
        ErrorKind::NotFoundOrForbidden | ErrorKind::NotFound => 3,
        ErrorKind::Conflict => 4,
        ErrorKind::Timeout => 5,
        ErrorKind::Internal => 1,
    }
}

fn run(cli: Cli) -> Result<()> {
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands don't need the database
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(&config);

    let db = Database::open(&config)
        .with_context(|| format!("Failed to open database {:?}", config.database_path()))?;
    let service = ResourceService::open(&db)?;
    debug!("Opened database at {:?}", db.path());

    let acting = ActingUser(cli.as_user);

    match cli.command {
        Commands::User { command } => handle_user_command(command, &service, acting, &output),
        Commands::Resource { command } => {
            handle_resource_command(command, &service, acting, &output)
        }
        Commands::Collection { command } => {
            handle_collection_command(command, &service, acting, &output)
        }
        Commands::Tags => commands::tag::list(&service, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

/// The `--as` user, required by commands that act on someone's behalf
#[derive(Clone, Copy)]
struct ActingUser(Option<i64>);

impl ActingUser {
    fn id(self) -> Result<i64> {
        self.0
            .context("This command needs the acting user: pass --as <USER_ID>")
    }
}

fn handle_user_command(
    command: UserCommands,
    service: &ResourceService,
    acting: ActingUser,
    output: &Output,
) -> Result<()> {
    match command {
        UserCommands::Add { username, email } => {
            commands::user::add(service, username, email, output)
        }
        UserCommands::Show { id } => commands::user::show(service, id, output),
        UserCommands::Follow { id } => commands::user::follow(service, acting.id()?, id, output),
    }
}

fn handle_resource_command(
    command: ResourceCommands,
    service: &ResourceService,
    acting: ActingUser,
    output: &Output,
) -> Result<()> {
    let user_id = acting.id()?;

    match command {
        ResourceCommands::Create {
            title,
            link,
            kind,
            privacy,
            tag,
        } => {
            let resource = NewResource::new(title, link, kind).with_privacy(privacy);
            commands::resource::create(service, user_id, resource, tag, output)
        }
        ResourceCommands::Update {
            id,
            title,
            link,
            kind,
            privacy,
            fields,
            add_tag,
            remove_tag,
        } => {
            let request = UpdateRequest {
                title,
                link,
                kind,
                privacy,
                fields,
                add_tags: add_tag,
                remove_tags: remove_tag,
            };
            commands::resource::update(service, user_id, id, request, output)
        }
        ResourceCommands::Delete { id } => commands::resource::delete(service, user_id, id, output),
        ResourceCommands::Recommend { id } => {
            commands::resource::recommend(service, user_id, id, output)
        }
        ResourceCommands::Show { id } => commands::resource::show(service, user_id, id, output),
    }
}

fn handle_collection_command(
    command: CollectionCommands,
    service: &ResourceService,
    acting: ActingUser,
    output: &Output,
) -> Result<()> {
    let owner_id = acting.id()?;

    match command {
        CollectionCommands::Create { name } => {
            commands::collection::create(service, owner_id, name, output)
        }
        CollectionCommands::List => commands::collection::list(service, owner_id, output),
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging
///
/// Filter comes from RUST_LOG, falling back to warnings only. Logs go to
/// `config.log_file` when set, stderr otherwise.
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if let Some(log_path) = &config.log_file {
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(log_file) => {
                // Ignore error if already initialized
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(log_file)
                    .try_init();
                return;
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            }
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
