use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::{get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use podium_api::media::MediaStore;
use podium_api::{AppState, AppStateInner, auth, items, profiles, rankings, reorder};
use podium_gateway::connection;
use podium_gateway::dispatcher::Dispatcher;

#[derive(Clone)]
struct ServerState {
    app: AppState,
    dispatcher: Dispatcher,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "podium=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("PODIUM_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("PODIUM_DB_PATH").unwrap_or_else(|_| "podium.db".into());
    let host = std::env::var("PODIUM_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PODIUM_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let media_dir = std::env::var("PODIUM_MEDIA_DIR").unwrap_or_else(|_| "media".into());
    let public_url =
        std::env::var("PODIUM_PUBLIC_URL").unwrap_or_else(|_| format!("http://{host}:{port}"));

    // Init database and media storage
    let db = Arc::new(podium_db::Database::open(&PathBuf::from(&db_path))?);
    let media = MediaStore::new(PathBuf::from(&media_dir), &public_url).await?;

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner::new(db.clone(), media, jwt_secret));

    let api_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/link", post(auth::request_link))
        .route("/auth/link/redeem", post(auth::redeem_link))
        .route("/auth/session", get(auth::current_session))
        .route("/auth/password", post(auth::update_password))
        .route("/auth/signout", post(auth::sign_out))
        .route(
            "/rankings",
            get(rankings::list_rankings).post(rankings::create_ranking),
        )
        .route(
            "/rankings/{ranking_id}",
            get(rankings::ranking_detail).patch(rankings::update_ranking),
        )
        .route("/rankings/{ranking_id}/next-rank", get(rankings::next_rank))
        .route("/rankings/{ranking_id}/items", post(items::create_item))
        .route(
            "/rankings/{ranking_id}/items/{item_id}",
            patch(items::update_item),
        )
        .route(
            "/rankings/{ranking_id}/items/{item_id}/move",
            post(reorder::move_item),
        )
        .route(
            "/profile",
            get(profiles::get_profile).put(profiles::upsert_profile),
        )
        .with_state(app_state.clone());

    let ws_route = Router::new()
        .route("/reveal/{ranking_id}", get(ws_upgrade))
        .with_state(ServerState {
            app: app_state,
            dispatcher,
        });

    let app = Router::new()
        .merge(api_routes)
        .merge(ws_route)
        .nest_service("/media", ServeDir::new(&media_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Podium server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(
    State(state): State<ServerState>,
    Path(ranking_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, state.app.db.clone(), ranking_id)
    })
}
