use clap::Parser;
use gedis::config::Config;
use gedis::{server, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::parse();

    server::run(config).await
}
