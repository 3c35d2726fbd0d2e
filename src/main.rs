use std::env;

use siklista::config::Config;
use siklista::error::{invalid_input_error, Error};
use siklista::{console, server};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    if let Err(err) = run().await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    let config = Config::from_env()?;

    match env::args().nth(1).as_deref() {
        Some("relay") => server::serve(config.relay_addr, config.directions()?).await,
        Some("book") | None => console::run_stdio(&config).await,
        Some(other) => {
            tracing::error!("unknown command {}, expected relay or book", other);
            Err(invalid_input_error())
        }
    }
}
