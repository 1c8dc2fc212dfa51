use std::{net::SocketAddr, str::FromStr, sync::Arc};

use axum::http::{header, HeaderValue, Method};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod cfg;
mod mongo_entities;
mod routes;
mod state;
mod storage;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = tokio::task::spawn_blocking(cfg::AppConfig::new)
        .await
        .unwrap();
    let mongo_db = mongodm::prelude::MongoClient::with_uri_str(&config.mongo_srv_url)
        .await
        .unwrap()
        .database(&config.mongo_db_nm);
    mongo_entities::sync(&mongo_db).await.unwrap();
    let files = Arc::new(storage::FileStore::new(&config.upload_dir).unwrap());
    let jwt = Arc::new(routes::common::auth::JwtKeys::new(&config.jwt_secret));
    let hash_cost = config.hash_cost;

    let app = routes::new(&config.upload_dir)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(config.clt_addr.parse::<HeaderValue>().unwrap())
                .allow_headers([
                    header::ACCEPT,
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    header::CONTENT_DISPOSITION,
                    header::CONTENT_LENGTH,
                ])
                .allow_methods([
                    Method::HEAD,
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                ]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state::AppState {
            mongo_db,
            jwt,
            files,
            hash_cost,
        });
    tracing::info!(address = %config.srv_addr, "starting server");
    axum::Server::bind(&SocketAddr::from_str(&config.srv_addr).unwrap())
        .serve(app.into_make_service())
        .await
        .unwrap();
}
