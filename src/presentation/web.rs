use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use sailfish::TemplateOnce;
use tracing::info;

use crate::domain::instance::InstanceOverview;
use crate::domain::ports::ContainerRuntime;
use crate::domain::value_objects::Credentials;

// ─── Web listing ──────────────────────────────────────────────────────────────

/// Shared state for the read-only listing server. Every request re-queries
/// the runtime, so the page always shows the live fleet.
#[derive(Clone)]
pub struct WebState {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub credentials: Credentials,
}

#[derive(TemplateOnce)]
#[template(path = "instances.stpl")] // base dir declared inside sailfish.toml
struct InstancesTemplate<'a> {
    instances: &'a [InstanceOverview],
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/instances", get(instances_json))
        .with_state(state)
}

/// Bind and serve the listing until the process is stopped.
pub async fn serve(state: WebState, port: u16) -> Result<()> {
    let addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("fleet listing on http://{addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn index(State(state): State<WebState>) -> Result<Html<String>, (StatusCode, String)> {
    let overview = crate::fleet_overview(Arc::clone(&state.runtime), &state.credentials)
        .await
        .map_err(internal_error)?;

    let page = InstancesTemplate {
        instances: &overview,
    }
    .render_once()
    .map_err(internal_error)?;

    Ok(Html(page))
}

async fn instances_json(
    State(state): State<WebState>,
) -> Result<Json<Vec<InstanceOverview>>, (StatusCode, String)> {
    let overview = crate::fleet_overview(Arc::clone(&state.runtime), &state.credentials)
        .await
        .map_err(internal_error)?;
    Ok(Json(overview))
}

fn internal_error<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instance::InstanceState;
    use crate::domain::value_objects::{DatabaseName, InstanceName};

    #[test]
    fn template_renders_the_fleet() {
        let overview = vec![
            InstanceOverview {
                name: InstanceName("alpha".into()),
                state: InstanceState::Running,
                port: Some(3310),
                databases: vec![
                    DatabaseName("shop".into()),
                    DatabaseName("analytics".into()),
                ],
            },
            InstanceOverview {
                name: InstanceName("beta".into()),
                state: InstanceState::Stopped,
                port: None,
                databases: vec![],
            },
        ];

        let page = InstancesTemplate {
            instances: &overview,
        }
        .render_once()
        .unwrap();

        assert!(page.contains("alpha"));
        assert!(page.contains("3310"));
        assert!(page.contains("shop, analytics"));
        assert!(page.contains("beta"));
        // State shows up twice per row: as the cell text and the CSS class.
        assert!(page.contains(r#"class="running""#));
        assert!(page.contains(r#"class="stopped""#));
        // The portless instance renders a dash, not an empty cell.
        assert!(page.contains("&mdash;"));
    }

    #[test]
    fn template_escapes_markup_in_names() {
        let overview = vec![InstanceOverview {
            name: InstanceName("<script>x".into()),
            state: InstanceState::Running,
            port: Some(3310),
            databases: vec![],
        }];

        let page = InstancesTemplate {
            instances: &overview,
        }
        .render_once()
        .unwrap();

        assert!(!page.contains("<script>x"));
        assert!(page.contains("&lt;script&gt;x"));
    }
}
