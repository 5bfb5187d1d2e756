//! Sachet CLI - command-line interface for the sachet static analyzer
//!
//! Context-aware static analyzer for WordPress-flavored PHP.

mod commands;
mod output;

use clap::Parser;
use commands::Commands;

#[derive(Parser, Debug)]
#[command(
    name = "sachet",
    author,
    version,
    about = "Context-aware static analyzer for WordPress-flavored PHP",
    long_about = "Sachet analyzes PHP source for WordPress security issues such as\n\
                  unprepared database queries, unescaped output and misused nonce\n\
                  checks, and reports them with actionable suggestions."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check(args) => args.run(),
        Commands::Init(args) => args.run(),
        Commands::Explain(args) => args.run(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_check_command() {
        let cli = Cli::try_parse_from(["sachet", "check", "./src"]).unwrap();
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.path.unwrap().to_str().unwrap(), "./src");
            }
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn cli_parses_check_staged() {
        let cli = Cli::try_parse_from(["sachet", "check", "--staged"]).unwrap();
        match cli.command {
            Commands::Check(args) => {
                assert!(args.staged);
                assert!(args.path.is_none());
            }
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn cli_parses_check_with_format() {
        let cli = Cli::try_parse_from(["sachet", "check", "./src", "--format", "json"]).unwrap();
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.format, "json");
            }
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn cli_parses_init_command() {
        let cli = Cli::try_parse_from(["sachet", "init"]).unwrap();
        assert!(matches!(cli.command, Commands::Init(_)));
    }

    #[test]
    fn cli_parses_init_with_force() {
        let cli = Cli::try_parse_from(["sachet", "init", "--force"]).unwrap();
        match cli.command {
            Commands::Init(args) => {
                assert!(args.force);
            }
            _ => panic!("Expected Init command"),
        }
    }

    #[test]
    fn cli_parses_explain_command() {
        let cli = Cli::try_parse_from(["sachet", "explain", "output-escaping"]).unwrap();
        match cli.command {
            Commands::Explain(args) => {
                assert_eq!(args.rule_id, "output-escaping");
            }
            _ => panic!("Expected Explain command"),
        }
    }

    #[test]
    fn cli_help_contains_commands() {
        let mut cmd = Cli::command();
        let help = cmd.render_help().to_string();
        assert!(help.contains("check"));
        assert!(help.contains("init"));
        assert!(help.contains("explain"));
    }

    #[test]
    fn check_help_shows_options() {
        let mut cmd = Cli::command();
        let check_cmd = cmd
            .get_subcommands_mut()
            .find(|c| c.get_name() == "check")
            .unwrap();
        let help = check_cmd.render_help().to_string();
        assert!(help.contains("PATH"));
        assert!(help.contains("--format"));
    }
}
