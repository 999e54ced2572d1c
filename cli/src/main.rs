mod list;
mod tui;

use std::fs::{self, OpenOptions};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use clap::Parser;
use taskdeck_core::config::data_dir;
use taskdeck_core::{
    parse_new_task, ClientConfig, FileSessionProvider, FilterMode, HttpTaskRepository,
    SessionProvider, StoreError, TaskId, TaskStore, User, ViewQuery,
};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "TASKDECK_LOG";
const LOG_FILE_NAME: &str = "taskdeck.log";

pub type Store = TaskStore<HttpTaskRepository>;

#[derive(Parser)]
#[command(name = "taskdeck")]
#[command(about = "Client for a remote task list", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Store a bearer token issued by the task API
    Login {
        #[arg(long)]
        token: String,
        /// Name shown in the welcome line
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List tasks (usage: list --filter pending --search milk)
    List {
        #[arg(short, long, default_value_t = FilterMode::All)]
        filter: FilterMode,
        #[arg(short, long, default_value = "")]
        search: String,
    },
    /// Add a task (usage: add "Task title" desc:Some longer description)
    Add {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Mark a task done, or pending again
    Toggle { id: TaskId },
    /// Delete a task
    Delete { id: TaskId },
    /// Open the Terminal User Interface
    Tui,
}

fn init_logging(to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    if to_file {
        // The terminal belongs to the UI, so logs go next to the session file.
        let dir = data_dir()?;
        fs::create_dir_all(&dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE_NAME))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn open_store(session: &Arc<FileSessionProvider>) -> Result<Arc<Store>> {
    let config = ClientConfig::load(None)?;
    tracing::debug!(url = %config.api_base_url, "using task api");
    let repo = HttpTaskRepository::new(&config)?;
    Ok(Arc::new(TaskStore::new(repo, session.clone())))
}

/// Loads the task list, turning session problems into actionable messages.
async fn start(store: &Store, session: &FileSessionProvider) -> Result<()> {
    match store.initialize(session.token()).await {
        Ok(()) => Ok(()),
        Err(StoreError::NotSignedIn) => {
            bail!("Not signed in. Run `taskdeck login --token <TOKEN>` first.")
        }
        Err(StoreError::AuthFailure) => {
            bail!("Your session has expired and you have been signed out. Log in again.")
        }
        Err(e) => Err(e.into()),
    }
}

fn report_mutation(err: StoreError) -> Result<()> {
    match err {
        StoreError::AuthFailure => {
            bail!("Your session has expired and you have been signed out. Log in again.")
        }
        StoreError::Validation(e) => {
            println!("Error: {}", e);
            Ok(())
        }
        other => Err(other.into()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Tui);
    init_logging(matches!(command, Commands::Tui))?;

    let session = Arc::new(FileSessionProvider::new(None)?);
    let runtime = Runtime::new()?;

    match command {
        Commands::Login { token, name, email } => {
            let user = User {
                id: None,
                name,
                email,
            };
            session.login(token, user)?;
            println!("Signed in.");
        }
        Commands::Logout => {
            session.logout();
            println!("Signed out.");
        }
        Commands::Whoami => match session.user() {
            Some(user) if !user.name.is_empty() => println!("{}", user.name),
            Some(_) => println!("Signed in (no name on record)"),
            None => println!("Not signed in."),
        },
        Commands::List { filter, search } => {
            let store = open_store(&session)?;
            runtime.block_on(start(&store, &session))?;
            let snapshot = store.snapshot();
            list::show_tasks(
                session.user().as_ref(),
                &snapshot.tasks,
                &ViewQuery::new(filter, search),
            );
        }
        Commands::Add { args } => {
            let (new_task, warnings) = parse_new_task(&args);
            for warning in warnings {
                println!("Warning: {}", warning);
            }

            let store = open_store(&session)?;
            runtime.block_on(async {
                start(&store, &session).await?;
                match store.add_task(&new_task.title, &new_task.description).await {
                    Ok(task) => {
                        println!("Task added: {} (ID: {})", task.title, task.id);
                        if !task.description.is_empty() {
                            println!("  Description: {}", task.description);
                        }
                        Ok(())
                    }
                    Err(e) => report_mutation(e),
                }
            })?;
        }
        Commands::Toggle { id } => {
            let store = open_store(&session)?;
            runtime.block_on(async {
                start(&store, &session).await?;
                match store.toggle_task(id).await {
                    Ok(Some(task)) => {
                        println!("Task {} is now {}", task.id, task.status_label().to_lowercase());
                        Ok(())
                    }
                    Ok(None) => {
                        println!("No task with ID {}", id);
                        Ok(())
                    }
                    Err(e) => report_mutation(e),
                }
            })?;
        }
        Commands::Delete { id } => {
            let store = open_store(&session)?;
            runtime.block_on(async {
                start(&store, &session).await?;
                match store.delete_task(id).await {
                    Ok(Some(task)) => {
                        println!("Task deleted: {} (ID: {})", task.title, task.id);
                        Ok(())
                    }
                    Ok(None) => {
                        println!("No task with ID {}", id);
                        Ok(())
                    }
                    Err(e) => report_mutation(e),
                }
            })?;
        }
        Commands::Tui => {
            if session.token().is_none() {
                bail!("Not signed in. Run `taskdeck login --token <TOKEN>` first.");
            }
            let store = open_store(&session)?;
            let outcome = tui::run(store, session.clone(), runtime.handle().clone())?;
            if outcome.signed_out {
                println!("Your session has expired and you have been signed out. Log in again.");
            } else if outcome.logged_out {
                println!("Signed out.");
            }
        }
    }
    Ok(())
}
