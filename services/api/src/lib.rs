mod cli;
mod infra;
mod routes;
mod server;

use scoring::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
