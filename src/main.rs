// src/main.rs

use clap::error::ErrorKind;
use envconsul::config::Config;
use envconsul::errors::exit_code;
use envconsul::{cli, load_config_file, logging, run};

#[tokio::main]
async fn main() {
    std::process::exit(run_main().await);
}

async fn run_main() -> i32 {
    let args = match cli::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_code::OK,
                _ => exit_code::PARSE_FLAGS_ERROR,
            };
        }
    };

    let file = match load_config_file(&args) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("envconsul error: {err}");
            return err.exit_code();
        }
    };

    if let Err(err) = logging::init_logging(args.log_level.or(file.log_level)) {
        eprintln!("envconsul error: {err:?}");
        return exit_code::LOGGING_ERROR;
    }

    let config = match Config::resolve(args, file) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return err.exit_code();
        }
    };

    run(config).await
}
