use tracing::Level;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` directives are honored on top of `default_level`.
pub fn init(default_level: Level) {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();
}
