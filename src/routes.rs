// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config,
    handlers::{marks, test},
    state::AppState,
    utils::jwt::{auth_middleware, teacher_middleware},
};

/// Assembles the main application router.
///
/// * Every route under `/api/v1/test` requires a valid session token.
/// * Creating tests and listing one's own tests additionally require the teacher role.
/// * Applies global middleware (Trace, CORS) and injects `AppState`.
pub fn create_router(state: AppState) -> Router {
    let teacher_routes = Router::new()
        .route("/create", post(test::create_test))
        .route("/getTestsByTeacherid", get(test::list_teacher_tests))
        .layer(middleware::from_fn(teacher_middleware));

    let test_routes = Router::new()
        .route(
            "/editTest/{test_id}",
            post(test::edit_test).put(test::edit_test),
        )
        .route("/deleteTest/{test_id}", delete(test::delete_test))
        .route("/getall", get(test::list_tests))
        .route("/getTestById/{id}", get(test::get_test))
        .route("/student/{student_id}", get(test::list_student_tests))
        .route("/submitTest", post(test::submit_test))
        .route("/marks", get(marks::my_marks))
        .route("/getcurrentmarks/{test_id}", get(marks::current_marks))
        .route("/getmarksfortestid/{test_id}", get(marks::marks_for_test))
        .merge(teacher_routes)
        // Auth runs first, then the teacher check on the merged routes
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(root))
        .nest("/api/v1/test", test_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config)),
        )
        .with_state(state)
}

async fn root() -> &'static str {
    "Assessment service is running"
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
