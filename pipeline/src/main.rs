use clap::{Arg, Command};
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let matches = Command::new("Carrier Review ETL")
        .version("1.0")
        .about("Loads carrier datasets and builds the reporting tables")
        .subcommand(
            Command::new("run")
                .about("Run the full pipeline")
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("FILE")
                        .help("Sets a custom config file"),
                ),
        )
        .subcommand(Command::new("plan").about("Print the validated task execution order"))
        .get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            let config_path = run_matches
                .get_one::<String>("config")
                .map(|s| s.as_str())
                .unwrap_or("config/pipeline.toml");

            if let Err(e) = pipeline::run_pipeline(config_path).await {
                eprintln!("Pipeline error: {}", e);
                process::exit(1);
            }
        }

        Some(("plan", _)) => match pipeline::pipeline_plan() {
            Ok(order) => {
                for task in order {
                    println!("{task}");
                }
            }
            Err(e) => {
                eprintln!("Invalid pipeline graph: {}", e);
                process::exit(1);
            }
        },

        _ => {
            eprintln!("Please specify a valid subcommand");
            process::exit(1);
        }
    }
}
