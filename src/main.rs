use lingo_relay::{config::Config, init_tracing, run, BoxError};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::load()?;
    run(config).await
}
