use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::manifest::Address;

#[derive(Parser)]
#[command(name = "tscloud")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative management of hosted search clusters", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Manifest describing the desired clusters and keys
    #[arg(
        short,
        long,
        global = true,
        env = "TSCLOUD_MANIFEST",
        default_value = "tscloud.toml"
    )]
    pub manifest: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(PlanArgs),

    /// Create, update and destroy entities to match the manifest
    Apply(ApplyArgs),

    /// Re-read every tracked cluster from the remote
    Refresh(RefreshArgs),

    /// Start tracking an existing cluster
    Import {
        /// Manifest address, e.g. clusters.search
        address: Address,
        /// Remote cluster id
        cluster_id: String,
    },

    /// Show a cluster by id without tracking it
    Lookup {
        /// Remote cluster id
        cluster_id: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Destroy one tracked entity
    Destroy {
        /// Manifest address, e.g. clusters.search
        address: Address,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Inspect tracked state
    #[command(subcommand)]
    State(StateCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Plan / Apply / Refresh
// ============================================================================

#[derive(Args)]
pub struct PlanArgs {
    /// Only consider this address
    #[arg(short, long)]
    pub target: Option<Address>,

    /// Parallel refresh jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Only apply changes to this address
    #[arg(short, long)]
    pub target: Option<Address>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Parallel refresh jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Args)]
pub struct RefreshArgs {
    /// Parallel refresh jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

// ============================================================================
// State
// ============================================================================

#[derive(Subcommand)]
pub enum StateCommand {
    /// List tracked entities
    List,

    /// Show one tracked entity
    Show {
        /// Manifest address, e.g. api_keys.search
        address: Address,
        /// Print API key values instead of masking them
        #[arg(long)]
        show_secrets: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from([
            "tscloud",
            "apply",
            "--target",
            "clusters.search",
            "--yes",
        ])
        .unwrap();
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.target, Some(Address::cluster("search")));
        assert!(args.yes);
        assert_eq!(args.jobs, 4);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tscloud", "plan", "-vv", "--manifest", "other.toml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.manifest, PathBuf::from("other.toml"));
    }

    #[test]
    fn test_bad_address_rejected() {
        assert!(Cli::try_parse_from(["tscloud", "destroy", "search"]).is_err());
    }

    #[test]
    fn test_state_show() {
        let cli = Cli::try_parse_from([
            "tscloud",
            "state",
            "show",
            "api_keys.search",
            "--show-secrets",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::State(StateCommand::Show { show_secrets: true, .. })
        ));
    }
}
