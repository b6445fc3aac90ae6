use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "cells_legacy=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    cells_legacy::run()?;
    Ok(())
}
