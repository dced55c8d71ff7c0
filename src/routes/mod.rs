use std::{str::FromStr, sync::Arc};

use axum::{
    Json, Router,
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    AppState,
    auth::require_basic_auth,
    error::{AppError, AppResult},
};

pub mod movies;
pub mod ratings;
pub mod users;

pub fn router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/users", post(users::new_user))
        .route("/movies", get(movies::search_movies));

    let protected = Router::new()
        .route("/users/{id}", get(users::get_user))
        .route("/movies", post(movies::add_movie))
        .route("/movies/{id}", get(movies::get_movie))
        .route("/movies/{id}/ratings", post(ratings::rate_movie).get(ratings::movie_ratings))
        .route("/ratings/{id}", get(ratings::get_rating))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_basic_auth));

    public
        .merge(protected)
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

/// 201 with a `Location` header pointing at the new resource.
fn created<T: Serialize>(location: String, body: T) -> Response {
    (StatusCode::CREATED, [(header::LOCATION, location)], Json(body)).into_response()
}

/// Query values that are missing or empty are treated the same.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_param<T: FromStr>(name: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::invalid(format!("{name} must be an integer, got {raw}")))
}

fn is_truthy(flag: Option<&str>) -> bool {
    match flag.map(str::trim) {
        None | Some("") => false,
        Some(v) => !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_of_mode_flags() {
        assert!(is_truthy(Some("true")));
        assert!(is_truthy(Some("1")));
        assert!(is_truthy(Some("yes")));
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some("")));
        assert!(!is_truthy(Some("False")));
        assert!(!is_truthy(Some("0")));
    }

    #[test]
    fn empty_params_count_as_missing() {
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(Some(" ".to_string())), Some(" ".to_string()));
        assert_eq!(non_empty(Some("new".to_string())), Some("new".to_string()));
    }

    #[test]
    fn malformed_integers_are_invalid_input() {
        assert_eq!(parse_param::<i32>("year", " 2021 ").unwrap(), 2021);
        let err = parse_param::<u64>("size", "ten").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
