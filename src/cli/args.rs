//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::step::StepName;

/// sitepipe static site build pipeline
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (searched upward from the current directory)
    #[arg(short = 'C', long, global = true, default_value = "sitepipe.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available tasks
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Compose pages from layouts and partials
    Html,

    /// Compile stylesheets
    Css,

    /// Copy scripts
    Js,

    /// Compress images
    Images,

    /// Copy fonts
    Fonts,

    /// Vendor third-party assets from the dependency cache
    Assets,

    /// Start the dev server and rebuild on file changes
    #[command(visible_alias = "w")]
    Watch {
        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// HTTP port number
        #[arg(short, long)]
        port: Option<u16>,

        /// Live reload WebSocket port
        #[arg(short, long)]
        reload_port: Option<u16>,
    },

    /// Build minified release output
    #[command(visible_alias = "b")]
    Build,
}

impl Commands {
    /// The single step this command runs, if it is a one-shot step task.
    pub const fn step(&self) -> Option<StepName> {
        match self {
            Self::Html => Some(StepName::Html),
            Self::Css => Some(StepName::Css),
            Self::Js => Some(StepName::Js),
            Self::Images => Some(StepName::Images),
            Self::Fonts => Some(StepName::Fonts),
            Self::Assets => Some(StepName::Assets),
            Self::Watch { .. } | Self::Build => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_short_verbose_and_version_flags() {
        let cli = Cli::try_parse_from(["sitepipe", "-v", "css"]).unwrap();
        assert!(cli.verbose);

        let err = Cli::try_parse_from(["sitepipe", "-V"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_parse_step_tasks() {
        let cli = Cli::try_parse_from(["sitepipe", "css"]).unwrap();
        assert_eq!(cli.command.step(), Some(StepName::Css));

        let cli = Cli::try_parse_from(["sitepipe", "assets"]).unwrap();
        assert_eq!(cli.command.step(), Some(StepName::Assets));
    }

    #[test]
    fn test_parse_watch_options() {
        let cli =
            Cli::try_parse_from(["sitepipe", "watch", "--port", "8080", "-r", "40000"]).unwrap();
        match cli.command {
            Commands::Watch {
                interface,
                port,
                reload_port,
            } => {
                assert!(interface.is_none());
                assert_eq!(port, Some(8080));
                assert_eq!(reload_port, Some(40000));
            }
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["sitepipe", "build", "--verbose", "-C", "site.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("site.toml"));
        assert!(cli.command.step().is_none());
    }
}
