use axum::{middleware, Router};
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::auth::login;
use crate::auth::middleware::JwtSecret;
use crate::collab::handler as ws_handler;
use crate::resources::{deliverables, drawings, people, pricing, proposals, schedule, scope};
use crate::state::AppState;
use crate::wbs::routes as wbs_routes;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting: 5 requests per minute per IP on the login endpoint
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(12)
            .burst_size(5)
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    let auth_routes = Router::new()
        .route("/api/auth/login", axum::routing::post(login::login))
        .layer(GovernorLayer {
            config: governor_config,
        });

    // Authenticated routes (JWT required — Claims extractor validates token)
    let me_routes = Router::new().route("/api/auth/me", axum::routing::get(login::me));

    let proposal_routes = Router::new()
        .route("/api/proposals", axum::routing::get(proposals::list_proposals))
        .route("/api/proposals", axum::routing::post(proposals::create_proposal))
        .route("/api/proposals/{id}", axum::routing::get(proposals::get_proposal))
        .route("/api/proposals/{id}", axum::routing::patch(proposals::update_proposal));

    let wbs = Router::new()
        .route(
            "/api/proposals/{proposal_id}/wbs",
            axum::routing::get(wbs_routes::list_wbs),
        )
        .route(
            "/api/proposals/{proposal_id}/wbs",
            axum::routing::post(wbs_routes::create_wbs_item),
        )
        .route(
            "/api/proposals/{proposal_id}/wbs/{item_id}",
            axum::routing::patch(wbs_routes::update_wbs_item),
        )
        .route(
            "/api/proposals/{proposal_id}/wbs/{item_id}",
            axum::routing::delete(wbs_routes::delete_wbs_item),
        )
        .route(
            "/api/proposals/{proposal_id}/wbs/{item_id}/links",
            axum::routing::get(wbs_routes::wbs_links),
        );

    let pricing_routes = Router::new()
        .route(
            "/api/proposals/{proposal_id}/pricing",
            axum::routing::get(pricing::list_pricing),
        )
        .route(
            "/api/proposals/{proposal_id}/pricing",
            axum::routing::post(pricing::create_pricing),
        )
        .route(
            "/api/proposals/{proposal_id}/pricing/{row_id}",
            axum::routing::patch(pricing::update_pricing),
        )
        .route(
            "/api/proposals/{proposal_id}/pricing/{row_id}",
            axum::routing::delete(pricing::delete_pricing),
        );

    let people_routes = Router::new()
        .route(
            "/api/proposals/{proposal_id}/people",
            axum::routing::get(people::list_people),
        )
        .route(
            "/api/proposals/{proposal_id}/people",
            axum::routing::post(people::create_person),
        )
        .route(
            "/api/proposals/{proposal_id}/people/{person_id}",
            axum::routing::patch(people::update_person),
        )
        .route(
            "/api/proposals/{proposal_id}/people/{person_id}",
            axum::routing::delete(people::delete_person),
        );

    let scope_routes = Router::new()
        .route(
            "/api/proposals/{proposal_id}/scope",
            axum::routing::get(scope::list_scope),
        )
        .route(
            "/api/proposals/{proposal_id}/scope",
            axum::routing::post(scope::create_scope_section),
        )
        .route(
            "/api/proposals/{proposal_id}/scope/{section_id}",
            axum::routing::patch(scope::update_scope_section),
        )
        .route(
            "/api/proposals/{proposal_id}/scope/{section_id}",
            axum::routing::delete(scope::delete_scope_section),
        );

    let schedule_routes = Router::new()
        .route(
            "/api/proposals/{proposal_id}/schedule",
            axum::routing::get(schedule::list_schedule),
        )
        .route(
            "/api/proposals/{proposal_id}/schedule",
            axum::routing::post(schedule::create_schedule_item),
        )
        .route(
            "/api/proposals/{proposal_id}/schedule/{item_id}",
            axum::routing::patch(schedule::update_schedule_item),
        )
        .route(
            "/api/proposals/{proposal_id}/schedule/{item_id}",
            axum::routing::delete(schedule::delete_schedule_item),
        );

    let deliverable_routes = Router::new()
        .route(
            "/api/proposals/{proposal_id}/deliverables",
            axum::routing::get(deliverables::list_deliverables),
        )
        .route(
            "/api/proposals/{proposal_id}/deliverables",
            axum::routing::post(deliverables::create_deliverable),
        )
        .route(
            "/api/proposals/{proposal_id}/deliverables/{deliverable_id}",
            axum::routing::patch(deliverables::update_deliverable),
        )
        .route(
            "/api/proposals/{proposal_id}/deliverables/{deliverable_id}",
            axum::routing::delete(deliverables::delete_deliverable),
        );

    let drawing_routes = Router::new()
        .route(
            "/api/proposals/{proposal_id}/drawings",
            axum::routing::get(drawings::list_drawings),
        )
        .route(
            "/api/proposals/{proposal_id}/drawings",
            axum::routing::post(drawings::create_drawing),
        )
        .route(
            "/api/proposals/{proposal_id}/drawings/{drawing_id}",
            axum::routing::patch(drawings::update_drawing),
        )
        .route(
            "/api/proposals/{proposal_id}/drawings/{drawing_id}",
            axum::routing::delete(drawings::delete_drawing),
        );

    // WebSocket endpoint (auth via query param, not JWT header)
    let ws_routes = Router::new().route(
        "/ws/proposals/{proposal_id}",
        axum::routing::get(ws_handler::ws_upgrade),
    );

    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(auth_routes)
        .merge(me_routes)
        .merge(proposal_routes)
        .merge(wbs)
        .merge(pricing_routes)
        .merge(people_routes)
        .merge(scope_routes)
        .merge(schedule_routes)
        .merge(deliverable_routes)
        .merge(drawing_routes)
        .merge(ws_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
