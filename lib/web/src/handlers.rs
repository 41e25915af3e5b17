use crate::error::ProfScopeServerError;
use crate::params::{CaptureQuery, ClearQuery, ViewParams};
use crate::render::{page_title, PageModel};
use crate::state::AppState;
use crate::views::ViewKind;
use axum::extract::{Query, RawQuery, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use profscope::capture::CapturedProfile;
use profscope::report::make_report;
use std::sync::Arc;

pub async fn handle_graph(
    state: State<AppState>,
    params: ViewParams,
) -> Result<Response, ProfScopeServerError> {
    render_view(state, ViewKind::Graph, params).await
}

pub async fn handle_top(
    state: State<AppState>,
    params: ViewParams,
) -> Result<Response, ProfScopeServerError> {
    render_view(state, ViewKind::Top, params).await
}

pub async fn handle_disasm(
    state: State<AppState>,
    params: ViewParams,
) -> Result<Response, ProfScopeServerError> {
    render_view(state, ViewKind::Disasm, params).await
}

pub async fn handle_source(
    state: State<AppState>,
    params: ViewParams,
) -> Result<Response, ProfScopeServerError> {
    render_view(state, ViewKind::Source, params).await
}

pub async fn handle_peek(
    state: State<AppState>,
    params: ViewParams,
) -> Result<Response, ProfScopeServerError> {
    render_view(state, ViewKind::Peek, params).await
}

pub async fn handle_flamegraph(
    state: State<AppState>,
    params: ViewParams,
) -> Result<Response, ProfScopeServerError> {
    render_view(state, ViewKind::Flamegraph, params).await
}

/// Captures a profile and redirects to the graph view, keeping the query.
pub async fn handle_genprof(
    State(state): State<AppState>,
    Query(query): Query<CaptureQuery>,
    RawQuery(raw_query): RawQuery,
) -> Result<Redirect, ProfScopeServerError> {
    let request = state
        .controller()
        .request(query.pt.as_deref(), query.sd.as_deref());
    let home = state.home_with_query(raw_query.as_deref());
    tokio::task::spawn_blocking(move || state.controller().capture(&request)).await??;
    Ok(Redirect::temporary(&home))
}

/// Removes the profile `pn`, or all profiles, and redirects to the graph view, keeping the query.
pub async fn handle_clearprof(
    State(state): State<AppState>,
    Query(query): Query<ClearQuery>,
    RawQuery(raw_query): RawQuery,
) -> Redirect {
    let cache = state.controller().cache();
    match query.pn.as_deref().filter(|name| !name.is_empty()) {
        Some(name) => {
            cache.evict(name);
            tracing::info!("Removed profile {name}");
        }
        None => {
            cache.clear();
            tracing::info!("Removed all profiles");
        }
    }
    Redirect::temporary(&state.home_with_query(raw_query.as_deref()))
}

async fn render_view(
    State(state): State<AppState>,
    kind: ViewKind,
    params: ViewParams,
) -> Result<Response, ProfScopeServerError> {
    tokio::task::spawn_blocking(move || render_view_blocking(&state, kind, &params)).await?
}

/// Resolves the profile, builds the report of the view, transforms it and renders the page.
fn render_view_blocking(
    state: &AppState,
    kind: ViewKind,
    params: &ViewParams,
) -> Result<Response, ProfScopeServerError> {
    let CapturedProfile { name, profile } =
        match state.controller().resolve(params.profile_name()) {
            Ok(captured) => captured,
            Err(error) => return Ok(format!("no profile available: {error}").into_response()),
        };

    let query = params
        .pairs()
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()));
    let output = make_report(
        Arc::clone(&profile),
        &kind.command(params.symbol()),
        query,
        kind.overrides(),
    )
    .map_err(|failure| {
        let mut message = failure.to_string();
        for diagnostic in &failure.diagnostics {
            message.push('\n');
            message.push_str(diagnostic);
        }
        ProfScopeServerError::BadRequest(message)
    })?;
    let report = output.report;
    let view = kind.transform(&report, state)?;

    let mut legend = view.legend;
    legend.push(format!("File: {name}"));

    let page = PageModel {
        title: page_title(&legend),
        errors: output.diagnostics,
        total: report.format_value(report.total()),
        legend,
        profile_names: state.controller().cache().names(),
        active_profile: name,
        sample_types: profile
            .sample_types
            .iter()
            .map(|sample_type| sample_type.kind.clone())
            .collect(),
        sample_index: report.sample_type().kind.clone(),
        nodes: view.nodes,
        path: state.prefix().to_owned(),
        body: view.body,
    };
    let html = state.renderer().render(kind.template(), &page)?;
    Ok(Html(html).into_response())
}
