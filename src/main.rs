use clap::Parser;
use log::{debug, LevelFilter};
use snafu::ErrorCompat;

mod args;
mod live;

#[tokio::main]
async fn main() {
    let args = args::Args::parse();

    let mut logs = env_logger::Builder::from_default_env();
    if args.verbose {
        logs.filter_level(LevelFilter::Debug);
    }
    logs.init();
    debug!("main: args: {:?}", args);

    if let Err(e) = live::run(&args).await {
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
