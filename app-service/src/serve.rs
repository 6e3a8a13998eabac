//! App page composition.

use axum::response::{Html, IntoResponse, Json, Response};
use html_escape::encode_double_quoted_attribute;

use common::errors::AppResult;
use common::events::{notify, Event};
use common::models::AppMetadata;
use common::utils::id_generator::is_dev_app_id;

use crate::render::{client_library_path, render_template, ShellProps, APP_TEMPLATE};
use crate::state::AppState;

/// What an app route answers with.
#[derive(Debug)]
pub enum ServedApp {
    /// Composed HTML page.
    Page(String),
    /// Raw metadata, answered in the test environment instead of a page.
    Metadata(AppMetadata),
}

impl IntoResponse for ServedApp {
    fn into_response(self) -> Response {
        match self {
            ServedApp::Page(html) => Html(html).into_response(),
            ServedApp::Metadata(metadata) => Json(metadata).into_response(),
        }
    }
}

/// Renders the page of an app and records that it was served.
pub async fn serve_app(state: &AppState, metadata: AppMetadata) -> AppResult<ServedApp> {
    let served = if state.config.is_test() {
        ServedApp::Metadata(metadata.clone())
    } else {
        ServedApp::Page(render_page(state, &metadata)?)
    };

    let app_id = metadata.app_id;
    let version = metadata.version;
    let event = if is_dev_app_id(&app_id) {
        Event::ServedAppPreview { app_id, version }
    } else {
        Event::ServedApp { app_id, version }
    };
    notify(state.events.as_ref(), event).await;
    Ok(served)
}

fn render_page(state: &AppState, metadata: &AppMetadata) -> AppResult<String> {
    let shell = state.renderer.render(&ShellProps {
        title: metadata.name.clone(),
        production: state.config.is_production(),
        app_id: metadata.app_id.clone(),
        client_lib_path: client_library_path(&metadata.app_id, &metadata.version),
    })?;
    let app_id = encode_double_quoted_attribute(&metadata.app_id);
    Ok(render_template(
        APP_TEMPLATE,
        &[
            ("head", shell.head.as_str()),
            ("body", shell.html.as_str()),
            ("style", shell.css.as_str()),
            ("appId", app_id.as_ref()),
        ],
    ))
}
