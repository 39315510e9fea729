mod checklist_cmds;
mod config;
mod context;
mod plan_cmds;
mod task_cmds;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use config::PitConfig;
use context::Context;

#[derive(Parser)]
#[command(name = "pit", about = "Individual work plans and checklists")]
struct Cli {
    /// API root URL (overrides PIT_API_URL env var)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a pit config file (uses --api-url when given)
    Init {
        /// Access token
        #[arg(long)]
        token: Option<String>,
        /// Refresh token used to renew the access token
        #[arg(long)]
        refresh_token: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Show who the configured token signs in as
    Whoami,
    /// Work plans
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Tasks of a work plan
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Self-assessment checklists
    Checklist {
        #[command(subcommand)]
        command: ChecklistCommands,
    },
    /// Print shell completions
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// List plans (optionally for one student)
    List {
        #[arg(long)]
        student: Option<i64>,
    },
    /// Show a plan with its sections and tasks
    Show { plan_id: i64 },
    /// Generate the plan for a reference date
    Generate {
        /// Class ID
        #[arg(long)]
        class: i64,
        /// Student ID (required for teachers and admins)
        #[arg(long)]
        student: Option<i64>,
        /// Reference date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Submit a draft plan for approval
    Submit {
        plan_id: i64,
        /// Checklist whose marks must all be done first
        #[arg(long)]
        checklist: Option<i64>,
    },
    /// Approve a submitted plan
    Approve { plan_id: i64 },
    /// Set the plan's general objectives
    Objectives { plan_id: i64, text: String },
    /// Record the student's self-evaluation
    SelfEval { plan_id: i64, text: String },
    /// Record the teacher's evaluation
    TeacherEval { plan_id: i64, text: String },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Add a task at the end of the plan
    Add {
        plan_id: i64,
        description: String,
        /// Section ID (omit for unassigned)
        #[arg(long)]
        section: Option<i64>,
    },
    /// Move a task (drag and drop)
    Move {
        plan_id: i64,
        task_id: i64,
        /// Target section ID (defaults to the task's current bucket)
        #[arg(long, conflicts_with = "unassigned")]
        section: Option<i64>,
        /// Move to the unassigned bucket
        #[arg(long)]
        unassigned: bool,
        /// Drop before this task (defaults to the end of the bucket)
        #[arg(long)]
        before: Option<i64>,
    },
    /// Delete a task
    Remove { plan_id: i64, task_id: i64 },
    /// Set a task's progress state (pending, in_progress, done, validated)
    SetState {
        plan_id: i64,
        task_id: i64,
        state: String,
    },
}

#[derive(Subcommand)]
pub enum ChecklistCommands {
    /// List checklist statuses (optionally for one class)
    List {
        #[arg(long)]
        class: Option<i64>,
    },
    /// Show a checklist with its marks
    Show { status_id: i64 },
    /// Start a checklist from a template
    Start {
        #[arg(long)]
        template: i64,
        #[arg(long)]
        class: i64,
    },
    /// Change one mark (NOT_STARTED, IN_PROGRESS, COMPLETED, VALIDATED)
    Mark {
        status_id: i64,
        mark_id: i64,
        state: String,
    },
    /// Set the student's notes
    Notes { status_id: i64, text: String },
    /// Submit the checklist for review
    Submit { status_id: i64 },
}

/// Execute the `pit init` command: write config file.
fn cmd_init(
    api_url: Option<&str>,
    token: Option<String>,
    refresh_token: Option<String>,
    force: bool,
) -> Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let url = api_url
        .unwrap_or(pit_api::config::ApiConfig::DEFAULT_URL)
        .to_owned();
    let cfg = config::ConfigFile {
        api: config::ApiSection { url: url.clone() },
        auth: config::AuthSection {
            token,
            refresh_token,
        },
    };
    config::save_config_to(&path, &cfg)?;

    println!("Config written to {}", path.display());
    println!("  api.url = {url}");
    if cfg.auth.token.is_none() {
        println!();
        println!("No token stored; set PIT_TOKEN before running other commands.");
    }
    Ok(())
}

fn cmd_whoami(ctx: &Context) {
    println!("{} ({})", ctx.user.display_name(), ctx.user.username);
    println!("  id:   {}", ctx.viewer.id);
    println!("  role: {}", ctx.viewer.role);
    if ctx.viewer.is_superuser {
        println!("  superuser");
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init {
            token,
            refresh_token,
            force,
        } => cmd_init(cli.api_url.as_deref(), token, refresh_token, force),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "pit", &mut std::io::stdout());
            Ok(())
        }
        Commands::Whoami => {
            let ctx = Context::connect(&PitConfig::resolve(cli.api_url.as_deref())).await?;
            cmd_whoami(&ctx);
            Ok(())
        }
        Commands::Plan { command } => {
            let ctx = Context::connect(&PitConfig::resolve(cli.api_url.as_deref())).await?;
            plan_cmds::run_plan_command(command, &ctx).await
        }
        Commands::Task { command } => {
            let ctx = Context::connect(&PitConfig::resolve(cli.api_url.as_deref())).await?;
            task_cmds::run_task_command(command, &ctx).await
        }
        Commands::Checklist { command } => {
            let ctx = Context::connect(&PitConfig::resolve(cli.api_url.as_deref())).await?;
            checklist_cmds::run_checklist_command(command, &ctx).await
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
