mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use energy_licensing::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
