mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    archive::{ArchiveArgs, SignoffSubcommand},
    create::CreateArgs,
    edit::{IssuesSubcommand, LinkArgs, SprintSubcommand, TagArgs},
    flag::FlagSubcommand,
    lifecycle::TrashSubcommand,
    manifest::ManifestSubcommand,
    query::ListArgs,
    registry::MilestoneSubcommand,
    report::{GroomArgs, StatsArgs},
    search::SearchArgs,
    workflow::{DemoteArgs, MoveArgs, PromoteArgs, ResolveArgs},
};
use kanban_core::config::ProjectType;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kanban",
    about = "File-based kanban: markdown tasks, a TSV manifest and a gated workflow",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from data/kanban/ or .git/)
    #[arg(long, global = true, env = "KANBAN_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create data/kanban/ with default registries and config
    Init {
        /// Project type (rust, python, node, shell, generic); detected when omitted
        #[arg(long = "type")]
        kind: Option<ProjectType>,
        /// Rewrite registries and config of an existing layout
        #[arg(long)]
        force: bool,
    },

    /// Create a task
    Create(CreateArgs),

    /// Show one task
    Show { id: String },

    /// List tasks from the manifest
    List(ListArgs),

    /// Find tasks by keyword
    Search(SearchArgs),

    /// Show the history of one task, or of every task merged by time
    History { id: Option<String> },

    /// Move a task forward through its gate
    Promote(PromoteArgs),

    /// Move a task backward
    Demote(DemoteArgs),

    /// Move tasks to any status without gate checks (requires --reason)
    Move(MoveArgs),

    /// Park tasks in blocked
    Block {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Release blocked tasks back to backlog
    Unblock {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Close a bug-family task (BUGS*, REG*, DEF*) with a resolution
    Resolve(ResolveArgs),

    /// Archive done tasks under the signoff rules
    Archive(ArchiveArgs),

    /// Manage the archival signoff list
    Signoff {
        #[command(subcommand)]
        subcommand: SignoffSubcommand,
    },

    /// Enable, disable or list feature flags
    Flag {
        #[command(subcommand)]
        subcommand: FlagSubcommand,
    },

    /// Attach references, NFRs, a verification command or a commit
    Link(LinkArgs),

    /// Add or remove tags
    Tag(TagArgs),

    /// Assign a task to a milestone
    Assign {
        id: String,
        /// Milestone id from milestones.toml
        milestone: Option<String>,
        /// Remove the current milestone
        #[arg(long, conflicts_with = "milestone")]
        clear: bool,
    },

    /// Manage sprint membership
    Sprint {
        #[command(subcommand)]
        subcommand: SprintSubcommand,
    },

    /// List or add issues in a task body
    Issues {
        #[command(subcommand)]
        subcommand: IssuesSubcommand,
    },

    /// Run a task's verification command
    Verify {
        id: String,
        /// Record the result on the task
        #[arg(long)]
        update: bool,
    },

    /// Maintain manifest.tsv
    Manifest {
        #[command(subcommand)]
        subcommand: ManifestSubcommand,
    },

    /// Give a task a new id
    Rename {
        old_id: String,
        new_id: String,
        /// Replace an existing task with the new id
        #[arg(long)]
        force: bool,
    },

    /// Move a task to the trash
    Delete {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Restore a trashed task by auto id
    Recover {
        auto_id: u64,
        #[arg(long)]
        reason: Option<String>,
    },

    /// List or empty the trash
    Trash {
        #[command(subcommand)]
        subcommand: TrashSubcommand,
    },

    /// Show every gate override
    Overrides,

    /// Find stub and backlog tasks that need more detail
    Groom(GroomArgs),

    /// Task counts and story points
    Stats(StatsArgs),

    /// List registered epics
    Epics,

    /// List milestones in priority order
    Milestones,

    /// Show, start or complete a milestone
    Milestone {
        #[command(subcommand)]
        subcommand: MilestoneSubcommand,
    },

    /// List non-functional requirements
    Nfrs,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let json = cli.json;

    let result = match cli.command {
        Commands::Init { kind, force } => cmd::init::run(&root, kind, force, json),
        Commands::Create(args) => cmd::create::run(&root, args, json),
        Commands::Show { id } => cmd::query::show(&root, &id, json),
        Commands::List(args) => cmd::query::list(&root, args, json),
        Commands::Search(args) => cmd::search::run(&root, args, json),
        Commands::History { id } => cmd::query::history(&root, id.as_deref(), json),
        Commands::Promote(args) => cmd::workflow::promote(&root, args, json),
        Commands::Demote(args) => cmd::workflow::demote(&root, args, json),
        Commands::Move(args) => cmd::workflow::move_tasks(&root, args, json),
        Commands::Block { ids, reason } => {
            cmd::workflow::block(&root, &ids, reason.as_deref(), json)
        }
        Commands::Unblock { ids, reason } => {
            cmd::workflow::unblock(&root, &ids, reason.as_deref(), json)
        }
        Commands::Resolve(args) => cmd::workflow::resolve(&root, args, json),
        Commands::Archive(args) => cmd::archive::run(&root, args, json),
        Commands::Signoff { subcommand } => cmd::archive::signoff(&root, subcommand, json),
        Commands::Flag { subcommand } => cmd::flag::run(&root, subcommand, json),
        Commands::Link(args) => cmd::edit::link(&root, args, json),
        Commands::Tag(args) => cmd::edit::tag(&root, args, json),
        Commands::Assign {
            id,
            milestone,
            clear,
        } => cmd::edit::assign(&root, &id, milestone.as_deref(), clear, json),
        Commands::Sprint { subcommand } => cmd::edit::sprint(&root, subcommand, json),
        Commands::Issues { subcommand } => cmd::edit::issues(&root, subcommand, json),
        Commands::Verify { id, update } => cmd::verify::run(&root, &id, update, json),
        Commands::Manifest { subcommand } => cmd::manifest::run(&root, subcommand, json),
        Commands::Rename {
            old_id,
            new_id,
            force,
        } => cmd::lifecycle::rename(&root, &old_id, &new_id, force, json),
        Commands::Delete { id, reason } => {
            cmd::lifecycle::delete(&root, &id, reason.as_deref(), json)
        }
        Commands::Recover { auto_id, reason } => {
            cmd::lifecycle::recover(&root, auto_id, reason.as_deref(), json)
        }
        Commands::Trash { subcommand } => cmd::lifecycle::trash(&root, subcommand, json),
        Commands::Overrides => cmd::report::overrides(&root, json),
        Commands::Groom(args) => cmd::report::groom(&root, args, json),
        Commands::Stats(args) => cmd::report::stats(&root, args, json),
        Commands::Epics => cmd::registry::epics(&root, json),
        Commands::Milestones => cmd::registry::milestones(&root, json),
        Commands::Milestone { subcommand } => cmd::registry::milestone(&root, subcommand, json),
        Commands::Nfrs => cmd::registry::nfrs(&root, json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
