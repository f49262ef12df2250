//! sqlbench - inspect and edit a SQLBench session from the terminal
//!
//! Every invocation opens the persisted session, runs one command against it
//! and flushes the resulting writes before exiting.

mod logging;
mod output;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use sqlbench_core::{
    DataSource, DataSourceId, DatabaseKind, FlatFileType, ObjectType, ScriptId, ScriptVersioning,
    TabId, VersionId, make_id,
};
use sqlbench_session::{Workbench, WorkbenchOptions};
use sqlbench_settings::WorkbenchSettings;
use sqlbench_storage::SqliteStore;
use sqlbench_versioning::{ScriptVersionRepository, VersionStorage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sqlbench", version, about = "Manage SQLBench sessions")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, env = "SQLBENCH_SETTINGS", global = true)]
    settings: Option<PathBuf>,

    /// Session database, overriding the settings
    #[arg(long, env = "SQLBENCH_DB", global = true)]
    db: Option<PathBuf>,

    /// Log to stderr; repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List open tabs in display order
    Tabs {
        /// Print tab records as JSON
        #[arg(long)]
        json: bool,
    },
    /// List scripts
    Scripts,
    /// List data sources
    Sources,
    /// Create a script
    NewScript {
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "")]
        content: String,
        /// Also open it in a tab
        #[arg(long)]
        open: bool,
    },
    /// Delete scripts along with their tabs and history
    RmScript {
        #[arg(required = true)]
        script_ids: Vec<ScriptId>,
    },
    /// Register a database
    AddDatabase {
        name: String,
        #[arg(long)]
        remote: bool,
    },
    /// Register a flat file; the view name defaults to the file stem
    AddFile {
        path: PathBuf,
        #[arg(long)]
        view_name: Option<String>,
    },
    /// Remove data sources and close their tabs
    RmSource {
        #[arg(required = true)]
        data_source_ids: Vec<DataSourceId>,
    },
    /// Open (or focus) the tab of a script
    Open { script_id: ScriptId },
    /// Open (or focus) the tab of a flat file source
    OpenFile { data_source_id: DataSourceId },
    /// Open (or focus) the tab of a table or view
    OpenTable {
        data_source_id: DataSourceId,
        schema: String,
        object: String,
        #[arg(long)]
        view: bool,
    },
    /// Make a tab the active one
    Activate { tab_id: TabId },
    /// Close tabs
    Close {
        #[arg(required = true)]
        tab_ids: Vec<TabId>,
    },
    /// Reorder tabs; every open tab must be listed once
    Reorder {
        #[arg(required = true)]
        tab_ids: Vec<TabId>,
    },
    /// Show the version history of a script
    Versions {
        script_id: ScriptId,
        /// Show the diff between the latest version and the script
        #[arg(long)]
        diff: bool,
    },
    /// Show a version and the versions it descends from
    History {
        version_id: VersionId,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Set the label of a version; omit the label to clear it
    Label {
        version_id: VersionId,
        label: Option<String>,
    },
    /// Diff two stored versions
    DiffVersions { from: VersionId, to: VersionId },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => WorkbenchSettings::load_from(path)?,
        None => WorkbenchSettings::load()?,
    };
    let _log_guard = logging::init(logging::LoggingConfig::from_settings(
        &settings.logging,
        cli.verbose,
    ))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run(cli, settings))
}

async fn run(cli: Cli, settings: WorkbenchSettings) -> Result<()> {
    let db_path = match cli.db {
        Some(path) => path,
        None => settings.storage.resolved_database_path()?,
    };
    let backend = Arc::new(SqliteStore::with_path(&db_path)?);

    let versions = if settings.versioning.enabled {
        let storage = VersionStorage::with_path(settings.storage.resolved_versions_path()?)?;
        Some(
            ScriptVersionRepository::with_storage(Arc::new(storage))
                .with_max_versions(settings.versioning.max_versions_per_script),
        )
    } else {
        None
    };
    let versioning = versions
        .clone()
        .map(|repo| Arc::new(repo) as Arc<dyn ScriptVersioning>);

    let options = WorkbenchOptions {
        view_state_cache_capacity: settings.session.view_state_cache_capacity,
        persistence_queue_capacity: settings.session.persistence_queue_capacity,
        restore_on_startup: settings.session.restore_on_startup,
    };
    tracing::debug!(db = %db_path.display(), "opening session");
    let workbench = Workbench::open(backend, versioning, options).await;

    let result = execute(&workbench, versions.as_ref(), cli.command).await;
    workbench.shutdown().await;
    result
}

async fn execute(
    workbench: &Workbench,
    versions: Option<&ScriptVersionRepository>,
    command: Command,
) -> Result<()> {
    match command {
        Command::Tabs { json } => {
            let snapshot = workbench.store().snapshot();
            if json {
                let tabs: Vec<_> = snapshot.ordered_tabs().collect();
                println!("{}", serde_json::to_string_pretty(&tabs)?);
            } else {
                println!("{}", output::tabs_table(&snapshot));
            }
        }
        Command::Scripts => {
            let scripts = workbench.scripts().list_sql_scripts();
            println!(
                "{}",
                output::scripts_table(&scripts, &workbench.store().snapshot())
            );
        }
        Command::Sources => {
            let sources = workbench.data_sources().list_data_sources();
            println!("{}", output::data_sources_table(&sources));
        }
        Command::NewScript {
            name,
            content,
            open,
        } => {
            let script = workbench
                .scripts()
                .create_sql_script(name.as_deref(), content);
            if open {
                workbench.tabs().get_or_create_tab_for_script(&script, true);
            }
            println!("{}\t{}", script.id, script.name);
        }
        Command::RmScript { script_ids } => {
            workbench.scripts().delete_sql_scripts(&script_ids).await?;
        }
        Command::AddDatabase { name, remote } => {
            let source = workbench.data_sources().add_data_source(DataSource::Database {
                id: make_id(),
                db_name: name,
                kind: if remote {
                    DatabaseKind::Remote
                } else {
                    DatabaseKind::Attached
                },
            });
            println!("{}", source.id());
        }
        Command::AddFile { path, view_name } => {
            let source = workbench
                .data_sources()
                .add_data_source(flat_file_source(&path, view_name)?);
            println!("{}", source.id());
        }
        Command::RmSource { data_source_ids } => {
            let removed = workbench
                .data_sources()
                .remove_data_sources(&data_source_ids)
                .await;
            println!("removed {}", removed);
        }
        Command::Open { script_id } => {
            let tab = workbench
                .tabs()
                .get_or_create_tab_from_script(&script_id, true)?;
            println!("{}", tab.id);
        }
        Command::OpenFile { data_source_id } => {
            let tab = workbench
                .tabs()
                .get_or_create_tab_from_flat_file_data_source(&data_source_id, true)?;
            println!("{}", tab.id);
        }
        Command::OpenTable {
            data_source_id,
            schema,
            object,
            view,
        } => {
            let object_type = if view {
                ObjectType::View
            } else {
                ObjectType::Table
            };
            let tab = workbench.tabs().get_or_create_tab_from_local_db_object(
                &data_source_id,
                &schema,
                &object,
                object_type,
                true,
            )?;
            println!("{}", tab.id);
        }
        Command::Activate { tab_id } => {
            workbench.tabs().set_active_tab_id(Some(tab_id))?;
        }
        Command::Close { tab_ids } => {
            workbench.tabs().delete_tab(&tab_ids).await;
        }
        Command::Reorder { tab_ids } => {
            workbench.tabs().set_tab_order(tab_ids)?;
        }
        Command::Versions { script_id, diff } => {
            let versions = require_versioning(versions)?;
            let history = versions.get_versions(&script_id)?;
            println!("{}", output::versions_table(&history));

            if diff {
                let script = workbench
                    .scripts()
                    .get_sql_script(&script_id)
                    .with_context(|| format!("script {} not found", script_id))?;
                match versions.diff_with_current(&script_id, &script.content)? {
                    Some(current) if current.is_modified => {
                        println!(
                            "+{} -{} since {}",
                            current.stats.insertions,
                            current.stats.deletions,
                            current.latest_version.short_id()
                        );
                        print!("{}", current.unified_diff);
                    }
                    Some(_) => println!("no changes since the latest version"),
                    None => println!("no versions recorded"),
                }
            }
        }
        Command::History { version_id, limit } => {
            let history = require_versioning(versions)?.get_history(&version_id, limit)?;
            if history.is_empty() {
                bail!("version {} not found", version_id);
            }
            println!("{}", output::versions_table(&history));
        }
        Command::Label { version_id, label } => {
            require_versioning(versions)?.label(&version_id, label.as_deref())?;
        }
        Command::DiffVersions { from, to } => {
            let diff = require_versioning(versions)?.diff(&from, &to)?;
            println!(
                "+{} -{} from {} to {}",
                diff.stats.insertions,
                diff.stats.deletions,
                diff.from_version.short_id(),
                diff.to_version.short_id()
            );
            print!("{}", diff.unified_diff);
        }
    }
    Ok(())
}

fn require_versioning(
    versions: Option<&ScriptVersionRepository>,
) -> Result<&ScriptVersionRepository> {
    versions.context("script versioning is disabled in the settings")
}

fn flat_file_source(path: &Path, view_name: Option<String>) -> Result<DataSource> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .context("file has no extension")?;
    let Some(file_type) = FlatFileType::from_extension(extension) else {
        bail!("unsupported file type: .{}", extension);
    };
    let view_name = match view_name {
        Some(name) => name,
        None => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .context("file name is not valid UTF-8")?
            .to_string(),
    };

    Ok(DataSource::FlatFile {
        id: make_id(),
        file_source_id: Some(path.display().to_string()),
        view_name,
        file_type,
    })
}
