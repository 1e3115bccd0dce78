use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use sentinel_stream::config::Config;
use sentinel_stream::handlers;
use sentinel_stream::state::AppState;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    log::info!("starting on {}:{}", config.api_host, config.api_port);

    let state = Arc::new(AppState::new(&config));
    let state_data = web::Data::new(state);
    let bind_addr = (config.api_host.clone(), config.api_port);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(Cors::permissive())
            .app_data(state_data.clone())
            .configure(handlers::configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}
