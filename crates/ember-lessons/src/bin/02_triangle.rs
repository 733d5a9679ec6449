use anyhow::Result;
use ember_engine::logging::{init_logging, LoggingConfig};

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());
    ember_lessons::run(ember_lessons::triangle::lesson())
}
