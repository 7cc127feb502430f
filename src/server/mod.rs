//! HTTP surface of the dashboard backend

use anyhow::Result;
use rocket::{catchers, config::LogLevel, routes, Build, Config, Rocket};

use crate::{config::ServerConfig, dashboard::Dashboard};

mod auth;
mod error;
mod routes;


pub use auth::{AuthSettings, AuthenticatedUser};
pub use error::{ApiError, ErrorBody};

pub fn build(dashboard: Dashboard, config: &ServerConfig) -> Rocket<Build> {
    rocket::custom(Config {
        log_level: LogLevel::Normal,
        address: config.address,
        port: config.port,
        ..Default::default()
    })
    .manage(dashboard)
    .manage(AuthSettings {
        user_header: config.user_header.clone(),
    })
    .mount("/", routes![routes::health])
    .mount(
        "/api/plaid",
        routes![
            routes::create_link_token,
            routes::set_access_token,
            routes::get_transactions,
            routes::remove_item,
            routes::list_items,
        ],
    )
    .register("/", catchers![error::default_catcher])
}

/// Runs the server until it's shut down
pub async fn serve(dashboard: Dashboard, config: &ServerConfig) -> Result<()> {
    log::info!("Listening on {}:{}", config.address, config.port);
    build(dashboard, config).launch().await?;
    Ok(())
}
