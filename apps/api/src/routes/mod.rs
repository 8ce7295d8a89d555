pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use crate::auth::{self, require_session, require_webhook_secret};
use crate::files::MAX_UPLOAD_BYTES;
use crate::state::AppState;
use crate::{analysis, applicants, email, files, intake, mcp, search, workflow};

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/auth/login", post(auth::handle_login))
        .route("/api/auth/logout", post(auth::handle_logout))
        .route("/api/auth/session", get(auth::handle_session));

    // Machine callers: form webhooks and the analysis queue.
    let webhooks = Router::new()
        .route("/api/webhooks/intake", post(intake::handlers::handle_intake))
        .route(
            "/api/analysis/queue",
            post(analysis::handlers::handle_queue_analysis),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_webhook_secret,
        ));

    let dashboard = Router::new()
        .route(
            "/api/applicants",
            get(applicants::handlers::handle_list_applicants)
                .post(applicants::handlers::handle_create_applicant),
        )
        .route(
            "/api/applicants/:id",
            get(applicants::handlers::handle_get_applicant)
                .put(applicants::handlers::handle_update_applicant)
                .delete(applicants::handlers::handle_delete_applicant),
        )
        .route(
            "/api/applicants/:id/summary",
            post(applicants::handlers::handle_generate_summary),
        )
        .route("/api/search", post(search::handlers::handle_search))
        .route("/api/email/send", post(email::handlers::handle_send_email))
        .route("/api/mcp", post(mcp::handlers::handle_mcp))
        .route(
            "/api/applications/:id/workflow",
            post(workflow::handle_workflow),
        )
        .route(
            "/api/applications/:id/files",
            post(files::handlers::handle_upload_file)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    public.merge(webhooks).merge(dashboard).with_state(state)
}
