use clap::{ArgAction, Parser};

#[derive(Parser)]
#[command(about, long_about = None)]
pub struct Cli {
	/// Path to a JSON config file. Falls back to `./config.json`, then to
	/// `RTC_SERVER_*` environment variables.
	#[arg(short, long, value_name = "FILE")]
	pub config: Option<String>,

	/// Show current version
	#[arg(short = 'v', visible_short_alias = 'V', long, action = ArgAction::SetTrue)]
	pub version: bool,
}
