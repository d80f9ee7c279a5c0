use time::macros::format_description;
use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, fmt::time::LocalTime, layer::SubscriberExt as _, util::SubscriberInitExt as _};

pub fn init_log(level: Option<Level>) -> eyre::Result<()> {
	let default = level.map_or(LevelFilter::OFF, LevelFilter::from_level);
	let filter = tracing_subscriber::filter::Targets::new()
		.with_targets(level.into_iter().flat_map(|level| {
			[
				("qrelay", level),
				("qrelay_core", level),
				("qrelay_server", level),
			]
		}))
		.with_default(default);

	tracing_subscriber::registry()
		.with(filter)
		.with(
			tracing_subscriber::fmt::layer()
				.with_target(true)
				.with_timer(LocalTime::new(format_description!(
					"[year repr:last_two]-[month]-[day] [hour]:[minute]:[second]"
				))),
		)
		.try_init()?;

	Ok(())
}
