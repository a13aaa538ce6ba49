use clap::Parser;
use ragkit::{app::state::AppState, config::StartArgs};

#[tokio::main]
async fn main() {
    let args = StartArgs::parse();

    let result = match AppState::new(&args) {
        Ok(state) => ragkit::cli::run(args.command, state).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        e.print();
        std::process::exit(1);
    }
}
