use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;

use coviewer_server::config::ServerConfig;
use coviewer_server::document_file::DocumentFiles;
use coviewer_server::handlers;
use coviewer_server::server::spawn_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    if let Err(err) = config.validate() {
        log::error!("Invalid configuration: {}", err);
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, err));
    }

    let documents = DocumentFiles::open(&config.upload_dir)
        .await
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?
        .with_max_bytes(config.max_upload_bytes);
    let srv_tx = web::Data::new(spawn_server(config.coordinator_options(), config.shards));
    let settings = web::Data::new(config.connection_settings());
    let documents = web::Data::new(documents);

    log::info!(
        "Listening on {} with {} coordinator shards",
        config.bind,
        config.shards
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .app_data(srv_tx.clone())
            .app_data(settings.clone())
            .app_data(documents.clone())
            .configure(handlers::root)
    })
    .bind(&config.bind)?
    .run()
    .await
}
