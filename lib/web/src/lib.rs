//! An axum [Router] that captures profiles of the serving process and renders them as call
//! graphs, hot lists, listings and flame graphs.

use axum::response::Redirect;
use axum::{routing::get, Router};
use profscope::cache::ProfileCache;
use profscope::capture::CaptureController;
use profscope::reporting::Binutils;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

mod config;
mod error;
mod handlers;
mod params;
mod render;
mod state;
mod svg;
mod views;

pub use config::ServerConfig;
pub use error::ProfScopeServerError;
pub use params::ViewParams;
pub use render::{PageModel, ViewBody};
pub use state::AppState;
pub use svg::{GraphConverter, Graphviz};
pub use views::ViewKind;

pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from_str(&config.bind)?;

    let source = Arc::new(config.capture.pprof_source());
    let controller =
        CaptureController::new(Arc::new(ProfileCache::default()), source, config.capture);
    let app_state = AppState::new(Arc::new(controller), &config.prefix)?
        .with_obj_tool(Arc::new(Binutils::new(config.objdump)))
        .with_graph_converter(Arc::new(Graphviz::new(config.dot)));
    let home = app_state.home();

    let app = create_router(app_state);
    let app = if config.cors {
        app.layer(tower_http::cors::CorsLayer::permissive())
    } else {
        app
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}{home}");
    Ok(axum::serve(listener, app).await?)
}

/// Creates the routes of all views below the prefix of `state`.
pub fn create_router(state: AppState) -> Router {
    let prefix = state.prefix().to_owned();
    let router = Router::new()
        .route(&format!("{prefix}/"), get(handlers::handle_graph))
        .route(&format!("{prefix}/top"), get(handlers::handle_top))
        .route(&format!("{prefix}/disasm"), get(handlers::handle_disasm))
        .route(&format!("{prefix}/source"), get(handlers::handle_source))
        .route(&format!("{prefix}/peek"), get(handlers::handle_peek))
        .route(&format!("{prefix}/flamegraph"), get(handlers::handle_flamegraph))
        .route(&format!("{prefix}/genprof"), get(handlers::handle_genprof))
        .route(&format!("{prefix}/clearprof"), get(handlers::handle_clearprof));

    let router = if prefix.is_empty() {
        router
    } else {
        let home = state.home();
        router.route(
            &prefix,
            get(move || async move { Redirect::permanent(&home) }),
        )
    };
    router.with_state(state)
}
