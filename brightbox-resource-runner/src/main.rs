/// The brightbox-resource-runner executable
///
/// Runs lookups and updates against a JSON fixture of remote entities, so the
/// reconciliation core can be exercised without an orchestrator or API access.
mod logging;

use std::path::PathBuf;
use std::process::exit;

use anyhow::{Context, Result};
use brightbox_resource::{
    memory::MemoryClient, reconcile::Reconciler, schema::EntityType, state::LocalState,
    update::build_update,
};
use brightbox_resource_runner::{
    load_fixture, parse_desired, parse_filters, parse_last_known, save_fixture,
};
use clap::{ColorChoice, CommandFactory, Parser, Subcommand};

fn main() {
    let args = Args::parse();
    handle_result(run_args(args));
}

fn run_args(args: Args) -> Result<()> {
    logging::set_up(&logging::Options {
        verbose: args.options.verbose,
        color: args.options.color,
    })?;

    match &args.command {
        Commands::Lookup {
            fixture,
            resource_type,
            filters,
        } => {
            let client = MemoryClient::with_entities(load_fixture(fixture)?);
            let filters = parse_filters(*resource_type, filters)?;
            let mut local = LocalState::new(*resource_type);
            Reconciler::new(&client)
                .read_into(&mut local, *resource_type, &filters)
                .with_context(|| format!("{} lookup failed", resource_type))?;
            println!("{}", serde_json::to_string_pretty(&local)?);
        }
        Commands::Plan {
            resource_type,
            desired_json,
            last_known_json,
        } => {
            let desired = parse_desired(desired_json)?;
            let last_known = parse_last_known(*resource_type, last_known_json)?;
            let target = build_update(&desired, &last_known)?;
            println!("{}", serde_json::to_string_pretty(&target)?);
        }
        Commands::Update {
            fixture,
            resource_type,
            id,
            desired_json,
            save,
        } => {
            let client = MemoryClient::with_entities(load_fixture(fixture)?);
            let desired = parse_desired(desired_json)?;
            let reconciler = Reconciler::new(&client);
            let mut local = LocalState::new(*resource_type);
            local.id = Some(id.clone());
            let last_known = reconciler
                .refresh(&mut local)?
                .with_context(|| format!("{} {} does not exist", resource_type, id))?;
            reconciler.update(&mut local, &desired, &last_known)?;
            if *save {
                save_fixture(fixture, &client)?;
            }
            println!("{}", serde_json::to_string_pretty(&local)?);
        }
        Commands::Fingerprint { payload } => {
            println!("{}", brightbox_resource::fingerprint(payload));
        }
        Commands::Encode { payload } => {
            println!("{}", brightbox_resource::ensure_encoded(payload));
        }
        Commands::GenerateMan => {
            let cmd = Args::command();
            let man = clap_mangen::Man::new(cmd);
            let mut buffer: Vec<u8> = Default::default();
            man.render(&mut buffer)?;
            println!("{}", String::from_utf8(buffer)?);
        }
        Commands::GenerateMarkdown => {
            let opts = clap_markdown::MarkdownOptions::new().show_footer(false);
            let markdown: String = clap_markdown::help_markdown_custom::<Args>(&opts);
            println!("{}", markdown);
        }
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Args::command();
            clap_complete::generate(
                *shell,
                &mut cmd,
                "brightbox-resource-runner",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

fn handle_result(r: Result<()>) {
    if let Err(e) = r {
        eprintln!("error: {}, {}", e.root_cause(), e);
        exit(1);
    }
}

/// Run Brightbox resource lookups and updates against a fixture
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: Options,
}

#[derive(Parser, Debug, Clone)]
struct Options {
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    #[arg(long, global = true, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a lookup to exactly one entity and print its local state
    Lookup {
        /// JSON array of remote entities standing in for the API
        #[arg(long)]
        fixture: PathBuf,

        /// The type of entity to look up, e.g. `database_server_type`
        #[arg(long("type"))]
        resource_type: EntityType,

        /// A filter on one field, as a regular expression
        ///
        /// Patterns match anywhere in the field; anchor them with `^` and `$`
        /// for an exact match. May be repeated for different fields.
        #[arg(long("filter"), short('f'), value_name = "FIELD=PATTERN")]
        filters: Vec<String>,
    },

    /// Print the partial update that moves a last-known snapshot to a desired state
    Plan {
        /// The type of entity being reconciled
        #[arg(long("type"))]
        resource_type: EntityType,

        /// The desired state, as a JSON object
        #[arg(long("desired-json"))]
        desired_json: String,

        /// The last-known remote snapshot, as a JSON object
        #[arg(long("last-known-json"))]
        last_known_json: String,
    },

    /// Apply a desired state to an entity in the fixture
    Update {
        /// JSON array of remote entities standing in for the API
        #[arg(long)]
        fixture: PathBuf,

        /// The type of entity to update
        #[arg(long("type"))]
        resource_type: EntityType,

        /// The id of the entity to update
        #[arg(long)]
        id: String,

        /// The desired state, as a JSON object
        #[arg(long("desired-json"))]
        desired_json: String,

        /// Write the resulting entities back to the fixture
        #[arg(long, default_value_t = false)]
        save: bool,
    },

    /// Print the content fingerprint of a payload
    Fingerprint {
        #[arg(long)]
        payload: String,
    },

    /// Print a payload base64 encoded, unless it already is
    Encode {
        #[arg(long)]
        payload: String,
    },

    /// Generate markdown documentation for brightbox-resource-runner
    #[command(hide = true)]
    GenerateMarkdown,

    /// Generate a manpage for brightbox-resource-runner
    #[command(hide = true)]
    GenerateMan,

    /// Generate shell completion for brightbox-resource-runner
    #[command(hide = true)]
    GenerateCompletion {
        /// The shell to generate completion for
        #[arg(long)]
        shell: clap_complete::Shell,
    },
}
