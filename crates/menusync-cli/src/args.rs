//! Command-line argument parsing.

use anyhow::{anyhow, bail, Context, Result};

use menusync_core::models::Language;

pub const USAGE: &str = "\
Usage: menusync [menu|info] [options]

Commands:
  menu            Show the menu of the selected outlet (default)
  info            Show the canteen info pages

Options:
  --outlet <ID>   Outlet to show (overrides config)
  --lang <cs|en>  Language (overrides config)
  --refresh       Fetch from the API even if saved data is fresh
  --watch         Keep running and refresh whenever data goes stale
  --save-config   Remember --outlet/--lang for next time
  --log-file      Also write logs to the cache directory
  -h, --help      Show this help";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    #[default]
    Menu,
    Info,
}

#[derive(Debug, Default, PartialEq)]
pub struct Args {
    pub command: Command,
    pub outlet: Option<u32>,
    pub language: Option<Language>,
    pub refresh: bool,
    pub watch: bool,
    pub save_config: bool,
    pub log_file: bool,
    pub help: bool,
}

impl Args {
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut parsed = Args::default();
        let mut args = args.into_iter();
        let mut command_seen = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "menu" | "info" if !command_seen => {
                    parsed.command = if arg == "menu" { Command::Menu } else { Command::Info };
                    command_seen = true;
                }
                "--outlet" => {
                    let value = args.next().ok_or_else(|| anyhow!("--outlet needs a value"))?;
                    parsed.outlet = Some(
                        value
                            .parse()
                            .with_context(|| format!("Invalid outlet id: {}", value))?,
                    );
                }
                "--lang" => {
                    let value = args.next().ok_or_else(|| anyhow!("--lang needs a value"))?;
                    parsed.language = Some(value.parse()?);
                }
                "--refresh" => parsed.refresh = true,
                "--watch" => parsed.watch = true,
                "--save-config" => parsed.save_config = true,
                "--log-file" => parsed.log_file = true,
                "-h" | "--help" => parsed.help = true,
                other => bail!("Unknown argument: {}\n\n{}", other, USAGE),
            }
        }

        Ok(parsed)
    }
}
