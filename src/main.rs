use clap::Parser;
use playsync_lib::{ServerArgs, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; PORT and friends may come from the environment.
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_args(ServerArgs::parse())?;
    playsync_lib::run(config).await
}
