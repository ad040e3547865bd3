/// Sets up logging for tests
pub fn setup_logging() {
    use tracing::Level;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
}
