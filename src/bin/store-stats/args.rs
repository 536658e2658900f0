use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
pub struct Args {
    #[arg(long, env = "DATABASE_PATH", default_value = "data/sensor_data.db")]
    pub database_path: PathBuf,
}
