use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tableferry::domain::ports::ContainerRuntime;
use tableferry::presentation::cli_summary::{
    print_copy_summary, print_databases, print_fleet, print_script_summary, print_tables,
};
use tableferry::presentation::web::{self, WebState};
use tableferry::{
    ConflictPolicy, ConnectionParams, CopyRequest, DatabaseName, DockerCli, InstanceName,
    LaunchSpec, LogLevel, Settings, TableName,
};

#[derive(Parser, Debug)]
#[command(
    name = "tableferry",
    about = "Tableferry — manage ephemeral MariaDB instances and ferry tables between them."
)]
struct Cli {
    /// Show SQL statements and docker invocations
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all instances with state, port and databases
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Launch a new MariaDB instance
    Create {
        /// Name for the new instance
        name: String,

        /// Host port to publish the database on
        #[arg(short, long)]
        port: u16,

        /// Root password for the new instance (defaults to the configured PASSWORD)
        #[arg(long)]
        root_password: Option<String>,

        /// Image to launch (defaults to MARIADB_IMAGE)
        #[arg(long)]
        image: Option<String>,
    },
    /// Remove an instance, running or stopped
    Delete {
        /// Instance name
        name: String,
    },
    /// Copy a table from one instance/database to another
    Copy {
        /// Source, as INSTANCE/DATABASE
        #[arg(long, value_name = "INSTANCE/DATABASE")]
        from: String,

        /// Destination, as INSTANCE/DATABASE
        #[arg(long, value_name = "INSTANCE/DATABASE")]
        to: String,

        /// Table to copy
        table: String,

        /// What to do when the destination table already exists
        #[arg(long, value_parser = ["append", "overwrite"])]
        policy: Option<String>,
    },
    /// Run a SQL script file against an instance or the configured endpoint
    Exec {
        /// Path to the .sql file
        script: PathBuf,

        /// Instance to run against (omit to connect to the configured HOST:PORT)
        #[arg(short, long)]
        instance: Option<String>,

        /// Database to select before the first statement
        #[arg(short, long)]
        database: Option<String>,
    },
    /// Inspect one instance: its databases, or the tables of one database
    Show {
        /// Instance name
        instance: String,

        /// List tables of this database instead of databases
        #[arg(short, long)]
        database: Option<String>,
    },
    /// Serve the read-only fleet listing over HTTP
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "5000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        LogLevel::Error
    } else if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    tableferry::init_tracing(level);

    let settings = Settings::load().context("failed to load configuration")?;
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerCli::new());

    match cli.command {
        Commands::List { json } => {
            let overview = tableferry::fleet_overview(runtime, &settings.credentials).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&overview)?);
            } else {
                print_fleet(&overview);
            }
        }

        Commands::Create {
            name,
            port,
            root_password,
            image,
        } => {
            let spec = LaunchSpec {
                name: InstanceName(name),
                host_port: port,
                root_password: root_password
                    .unwrap_or_else(|| settings.credentials.password.clone()),
                image: image.unwrap_or_else(|| settings.image.clone()),
            };

            let instance = tableferry::create_instance(runtime, &spec).await?;
            println!("instance '{}' is up on port {}", instance.name, port);
        }

        Commands::Delete { name } => {
            let name = InstanceName(name);
            tableferry::delete_instance(runtime, &name).await?;
            println!("instance '{name}' deleted");
        }

        Commands::Copy {
            from,
            to,
            table,
            policy,
        } => {
            let (source_instance, source_database) = parse_endpoint(&from)?;
            let (destination_instance, destination_database) = parse_endpoint(&to)?;

            let request = CopyRequest {
                source_instance,
                source_database,
                table: TableName(table),
                destination_instance,
                destination_database,
                policy: policy.as_deref().map(parse_policy).transpose()?,
            };

            let report = tableferry::copy_table(runtime, &settings.credentials, &request).await?;
            print_copy_summary(&report);
        }

        Commands::Exec {
            script,
            instance,
            database,
        } => {
            let sql = std::fs::read_to_string(&script)
                .with_context(|| format!("failed to read {}", script.display()))?;
            let database = database.map(DatabaseName);

            let report = match instance {
                Some(name) => {
                    tableferry::run_script(
                        runtime,
                        &settings.credentials,
                        &InstanceName(name),
                        database.as_ref(),
                        &sql,
                    )
                    .await?
                }
                None => {
                    let port = settings
                        .default_port
                        .context("no instance given and PORT is not set")?;
                    let params = ConnectionParams {
                        host: settings.credentials.host.clone(),
                        port,
                        user: settings.credentials.user.clone(),
                        password: settings.credentials.password.clone(),
                    };
                    tableferry::run_script_at(&params, database.as_ref(), &sql).await?
                }
            };
            print_script_summary(&report);
        }

        Commands::Show { instance, database } => match database {
            Some(db) => {
                let db = DatabaseName(db);
                let tables = tableferry::list_tables(
                    runtime,
                    &settings.credentials,
                    &InstanceName(instance.clone()),
                    &db,
                )
                .await?;
                print_tables(&instance, &db, &tables);
            }
            None => {
                let databases = tableferry::list_databases(
                    runtime,
                    &settings.credentials,
                    &InstanceName(instance.clone()),
                )
                .await?;
                print_databases(&instance, &databases);
            }
        },

        Commands::Serve { port } => {
            let state = WebState {
                runtime,
                credentials: settings.credentials.clone(),
            };
            web::serve(state, port).await?;
        }
    }

    Ok(())
}

/// "instance/database" → typed pair.
fn parse_endpoint(value: &str) -> Result<(InstanceName, DatabaseName)> {
    let parsed = value.split_once('/').and_then(|(instance, database)| {
        if instance.is_empty() || database.is_empty() {
            None
        } else {
            Some((
                InstanceName(instance.to_string()),
                DatabaseName(database.to_string()),
            ))
        }
    });
    parsed.with_context(|| format!("expected INSTANCE/DATABASE, got '{value}'"))
}

fn parse_policy(value: &str) -> Result<ConflictPolicy> {
    match value {
        "append" => Ok(ConflictPolicy::Append),
        "overwrite" => Ok(ConflictPolicy::Overwrite),
        other => anyhow::bail!("unknown conflict policy: {other}"),
    }
}
