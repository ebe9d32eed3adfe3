pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::reaction::{ChannelArgs, TargetArgs, TriggerArgs, WriteArgs};

#[derive(Debug, Parser)]
#[command(
    name = "skelly",
    about = "Skelly operator CLI",
    long_about = "Manage channel reactions, inspect statistics, and check Skelly runtime readiness.",
    after_help = "Examples:\n  skelly reaction add -c C0123 -e :wave: -r \"hello!\"\n  skelly reaction trigger -c C0123 -e wave -u U0456 --dry-run\n  skelly stats workspace\n  skelly doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(visible_alias = "r", about = "Control reactions for a channel")]
    Reaction {
        #[command(subcommand)]
        action: ReactionAction,
    },
    #[command(about = "Report how many reactions are configured")]
    Stats {
        #[command(subcommand)]
        scope: StatsScope,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Slack credentials, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum ReactionAction {
    #[command(visible_alias = "get", about = "View one reaction")]
    View(TargetArgs),
    #[command(visible_alias = "l", about = "List reactions for a channel")]
    List(ChannelArgs),
    #[command(about = "Remove every reaction in a channel")]
    Clear(ChannelArgs),
    #[command(visible_alias = "a", about = "Add a reaction")]
    Add(WriteArgs),
    #[command(visible_alias = "u", about = "Change the response of a reaction")]
    Update(WriteArgs),
    #[command(visible_alias = "d", about = "Delete a reaction")]
    Delete(TargetArgs),
    #[command(visible_alias = "t", about = "Simulate a reaction or message and dispatch responses")]
    Trigger(TriggerArgs),
}

#[derive(Debug, Subcommand)]
enum StatsScope {
    #[command(about = "Reaction count for one channel")]
    Channel(ChannelArgs),
    #[command(about = "Reaction counts for every channel, with names from Slack")]
    Workspace,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Reaction { action } => match action {
            ReactionAction::View(args) => commands::reaction::view(&args),
            ReactionAction::List(args) => commands::reaction::list(&args),
            ReactionAction::Clear(args) => commands::reaction::clear(&args),
            ReactionAction::Add(args) => commands::reaction::add(&args),
            ReactionAction::Update(args) => commands::reaction::update(&args),
            ReactionAction::Delete(args) => commands::reaction::delete(&args),
            ReactionAction::Trigger(args) => commands::reaction::trigger(&args),
        },
        Command::Stats { scope } => match scope {
            StatsScope::Channel(args) => commands::stats::channel(&args),
            StatsScope::Workspace => commands::stats::workspace(),
        },
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
