use axum::{
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod system;
pub mod users;

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/authorize", post(auth::sign_in))
        .route("/users", post(users::create_user))
}

/// Endpoints behind the request gate.
pub fn protected_router() -> Router {
    Router::new()
        .route("/me", get(auth::me))
        .route("/users", get(users::list_users))
        .route(
            "/users/:id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
}
