use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match grant_gun_cli::run(std::env::args()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("❌ Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
