use std::process::ExitCode;

use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file when present.
    // Deployed environments configure the process environment directly.
    let _ = dotenvy::dotenv();

    llm_gateway::telemetry::init_tracing("info");

    match api::start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "service terminated");
            ExitCode::from(e.exit_code())
        }
    }
}
