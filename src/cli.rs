use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "agentflow")]
#[command(version)]
#[command(about = "Signal-to-execution pipeline for autonomous on-chain trading agents", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Force dry run mode (no transactions broadcast)
    #[arg(short, long)]
    pub dry_run: bool,

    /// Directory holding default.toml and environment overrides
    #[arg(short, long, env = "AGENTFLOW_CONFIG_DIR", default_value = "config")]
    pub config_dir: String,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run trading cycles for every active agent on the configured interval
    Run,
    /// Run a single cycle for one agent and exit
    Cycle {
        /// Agent id
        #[arg(short, long)]
        agent: String,
    },
    /// Apply database migrations
    Migrate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cycle_command() {
        let cli = Cli::parse_from(["agentflow", "--dry-run", "cycle", "--agent", "agent-7"]);
        assert!(cli.dry_run);
        assert_eq!(cli.config_dir, "config");
        assert_eq!(
            cli.command,
            Commands::Cycle {
                agent: "agent-7".into()
            }
        );
    }
}
