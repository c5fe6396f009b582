//! CLI argument parsing for Vista CLI.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Vista - render Minijinja views from the command line.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// View configuration file (YAML). Overrides --root and --option.
    #[arg(short, long, global = true, env = "VISTA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Template root directory.
    #[arg(short, long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// View option as name=value, e.g. `refresh=true`. Repeatable.
    #[arg(short = 'o', long = "option", global = true, value_parser = parse_option)]
    pub options: Vec<(String, String)>,

    /// Skip unknown options instead of failing.
    #[arg(long, global = true)]
    pub lenient: bool,

    /// Verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render a whole template.
    Render(RenderArgs),

    /// Render a single block of a template.
    Block(BlockArgs),
}

/// Arguments for the render subcommand.
#[derive(Debug, clap::Args)]
pub struct RenderArgs {
    /// Template identifier, relative to the root.
    pub template: String,

    /// Data file (JSON or YAML).
    #[arg(short, long)]
    pub data: Option<PathBuf>,
}

/// Arguments for the block subcommand.
#[derive(Debug, clap::Args)]
pub struct BlockArgs {
    /// Template identifier, relative to the root.
    pub template: String,

    /// Name of the block to render.
    pub block: String,

    /// Data file (JSON or YAML).
    #[arg(short, long)]
    pub data: Option<PathBuf>,
}

fn parse_option(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    if name.is_empty() {
        return Err(format!("missing option name in `{raw}`"));
    }
    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing_render() {
        let args = Args::try_parse_from([
            "vista",
            "--root",
            "templates",
            "-o",
            "refresh=true",
            "-o",
            "contentType=html",
            "render",
            "test",
        ])
        .unwrap();

        assert_eq!(args.root, PathBuf::from("templates"));
        assert_eq!(
            args.options,
            vec![
                ("refresh".to_string(), "true".to_string()),
                ("contentType".to_string(), "html".to_string()),
            ]
        );
        assert!(matches!(args.command, Command::Render(ref r) if r.template == "test"));
    }

    #[test]
    fn test_args_parsing_block() {
        let args =
            Args::try_parse_from(["vista", "block", "page.jinja", "hello", "-d", "data.json"])
                .unwrap();

        match args.command {
            Command::Block(block) => {
                assert_eq!(block.template, "page.jinja");
                assert_eq!(block.block, "hello");
                assert_eq!(block.data, Some(PathBuf::from("data.json")));
            }
            Command::Render(_) => panic!("Expected block command"),
        }
    }

    #[test]
    fn test_parse_option() {
        assert_eq!(
            parse_option("cacheDir=/tmp/a=b").unwrap(),
            ("cacheDir".to_string(), "/tmp/a=b".to_string())
        );
        assert!(parse_option("refresh").is_err());
        assert!(parse_option("=true").is_err());
    }
}
