pub mod audit;
pub mod auth;
pub mod bid_types;
pub mod bids;
pub mod health;
pub mod notifications;
pub mod roles;
pub mod users;

use actix_web::{
    web, Error, HttpResponse,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::Method,
    middleware::{Next, from_fn},
};

use crate::api_types::ApiErrorResponse;
use crate::auth::middleware::require_auth;

/// CSRF guard for mutations: POST/PUT/DELETE must send `Content-Type: application/json`.
///
/// A cross-site form post cannot carry that header together with the session cookie.
async fn require_json_content_type(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let method = req.method().clone();

    if method == Method::POST || method == Method::PUT || method == Method::DELETE {
        let content_type = req
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if !content_type.starts_with("application/json") {
            let response = HttpResponse::BadRequest().json(ApiErrorResponse::new(
                "Content-Type must be application/json for mutation requests",
            ));
            return Ok(req.into_response(response).map_into_right_body());
        }
    }

    next.call(req).await.map(|res| res.map_into_left_body())
}

/// Configure the JSON API. Mount under `/api`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health));
    cfg.service(
        web::scope("/auth")
            .wrap(from_fn(require_json_content_type))
            .route("/login", web::post().to(auth::login))
            .route("/logout", web::post().to(auth::logout))
            .route("/me", web::get().to(auth::me)),
    );
    cfg.service(
        web::scope("/bid-types")
            .wrap(from_fn(require_json_content_type))
            .wrap(from_fn(require_auth))
            .route("", web::get().to(bid_types::list))
            .route("", web::post().to(bid_types::create))
            .route("/{id}", web::get().to(bid_types::read))
            .route("/{id}", web::put().to(bid_types::update))
            .route("/{id}", web::delete().to(bid_types::delete))
            .route("/{id}/statuses", web::get().to(bid_types::list_statuses))
            .route("/{id}/statuses", web::post().to(bid_types::create_status))
            .route("/{id}/statuses/{position}", web::put().to(bid_types::update_status))
            .route("/{id}/statuses/{position}", web::delete().to(bid_types::delete_status))
            .route("/{id}/statuses/{position}/next", web::get().to(bid_types::next_statuses))
            .route("/{id}/transitions", web::get().to(bid_types::list_transitions))
            .route("/{id}/transitions", web::post().to(bid_types::create_transition))
            .route("/{id}/transitions/{from}/{to}", web::delete().to(bid_types::delete_transition)),
    );
    cfg.service(
        web::scope("/bids")
            .wrap(from_fn(require_json_content_type))
            .wrap(from_fn(require_auth))
            .route("", web::get().to(bids::list))
            .route("", web::post().to(bids::create))
            .route("/{id}", web::get().to(bids::read))
            .route("/{id}", web::put().to(bids::update))
            .route("/{id}", web::delete().to(bids::delete))
            .route("/{id}/status", web::put().to(bids::change_status))
            .route("/{id}/transitions", web::get().to(bids::transitions))
            .route("/{id}/history", web::get().to(bids::history))
            .route("/{id}/comments", web::get().to(bids::list_comments))
            .route("/{id}/comments", web::post().to(bids::add_comment))
            .route("/{id}/comments/{comment_id}", web::put().to(bids::update_comment))
            .route("/{id}/comments/{comment_id}", web::delete().to(bids::delete_comment)),
    );
    cfg.service(
        web::scope("/roles")
            .wrap(from_fn(require_json_content_type))
            .wrap(from_fn(require_auth))
            .route("", web::get().to(roles::list))
            .route("", web::post().to(roles::create))
            .route("/{id}", web::get().to(roles::read))
            .route("/{id}", web::put().to(roles::update))
            .route("/{id}", web::delete().to(roles::delete)),
    );
    cfg.service(
        web::scope("/users")
            .wrap(from_fn(require_json_content_type))
            .wrap(from_fn(require_auth))
            .route("", web::get().to(users::list))
            .route("", web::post().to(users::create))
            .route("/{id}", web::get().to(users::read)),
    );
    cfg.service(
        web::scope("/audit")
            .wrap(from_fn(require_auth))
            .route("", web::get().to(audit::list)),
    );
    // /read-all and /unread-count BEFORE /{id} routes
    cfg.service(
        web::scope("/notifications")
            .wrap(from_fn(require_json_content_type))
            .wrap(from_fn(require_auth))
            .route("", web::get().to(notifications::list))
            .route("/unread-count", web::get().to(notifications::unread_count))
            .route("/read-all", web::put().to(notifications::mark_all_read))
            .route("/{id}/read", web::put().to(notifications::mark_read))
            .route("/{id}", web::delete().to(notifications::delete)),
    );
}
