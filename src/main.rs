use actix_web::{middleware::Logger, web, App, HttpServer};
use token_gate::{auth::TokenAuthority, config::AppConfig, configure, logging};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    logging::init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };
    let addr = config.bind_address();

    tracing::info!(
        username = %config.auth.account.username,
        algorithm = ?config.auth.algorithm,
        ttl_minutes = config.auth.ttl.num_minutes(),
        "loaded configuration"
    );

    let authority = match TokenAuthority::new(config.auth) {
        Ok(authority) => web::Data::new(authority),
        Err(err) => {
            tracing::error!("failed to initialise token authority: {err}");
            std::process::exit(1);
        }
    };

    tracing::info!("listening on {addr}");

    HttpServer::new(move || {
        App::new()
            .app_data(authority.clone())
            .wrap(Logger::default())
            .configure(configure)
    })
    .bind(addr)?
    .run()
    .await
}
