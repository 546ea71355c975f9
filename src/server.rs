use axum::{
    extract::{Form, Path, State, WebSocketUpgrade},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::connection::ConnectionWorker;
use crate::group::{ErrGroupManager, GroupManager};

const MIN_PLAYGROUND_SIDE: u8 = 8;

#[derive(Clone)]
struct AppState {
    manager: Arc<GroupManager>,
}

#[derive(Debug, Deserialize)]
struct CreateGameForm {
    limit: Option<usize>,
    width: Option<u8>,
    height: Option<u8>,
}

#[derive(Debug, Serialize)]
struct GameResponse {
    id: usize,
    limit: usize,
    count: usize,
    width: u8,
    height: u8,
}

#[derive(Debug, Serialize)]
struct GamesResponse {
    games: Vec<GameResponse>,
    limit: usize,
    count: usize,
}

#[derive(Debug, Serialize)]
struct DeleteGameResponse {
    id: usize,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(manager: Arc<GroupManager>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/games", get(list_games).post(create_game))
        .route("/games/:id", get(get_game).delete(delete_game))
        .route("/games/:id/ws", get(game_ws))
        .layer(cors)
        .with_state(AppState { manager })
}

fn bad_request(message: &str) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
        .into_response()
}

async fn create_game(
    State(state): State<AppState>,
    Form(form): Form<CreateGameForm>,
) -> impl IntoResponse {
    let Some(limit) = form.limit.filter(|limit| *limit > 0) else {
        return bad_request("limit must be a positive number");
    };
    let (Some(width), Some(height)) = (form.width, form.height) else {
        return bad_request("width and height are required");
    };
    if width < MIN_PLAYGROUND_SIDE || height < MIN_PLAYGROUND_SIDE {
        return bad_request("playground is too small");
    }

    match state.manager.new_group(limit, width, height) {
        Ok(group) => (
            StatusCode::OK,
            Json(GameResponse {
                id: group.id(),
                limit: group.limit(),
                count: group.connection_count(),
                width: group.world().width(),
                height: group.world().height(),
            }),
        )
            .into_response(),
        Err(error) => {
            tracing::warn!(%error, "cannot create game group");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: error.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn list_games(State(state): State<AppState>) -> impl IntoResponse {
    let games: Vec<GameResponse> = state
        .manager
        .list()
        .into_iter()
        .map(|info| GameResponse {
            id: info.id,
            limit: info.limit,
            count: info.count,
            width: info.width,
            height: info.height,
        })
        .collect();
    let count = games.len();
    Json(GamesResponse {
        games,
        limit: state.manager.groups_limit(),
        count,
    })
}

async fn get_game(State(state): State<AppState>, Path(id): Path<usize>) -> impl IntoResponse {
    match state.manager.get(id) {
        Ok(group) => (
            StatusCode::OK,
            Json(GameResponse {
                id: group.id(),
                limit: group.limit(),
                count: group.connection_count(),
                width: group.world().width(),
                height: group.world().height(),
            }),
        )
            .into_response(),
        Err(error) => not_found_or_500(error),
    }
}

async fn delete_game(State(state): State<AppState>, Path(id): Path<usize>) -> impl IntoResponse {
    match state.manager.delete(id) {
        Ok(()) => (StatusCode::OK, Json(DeleteGameResponse { id })).into_response(),
        Err(error @ ErrGroupManager::GroupNotEmpty) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: error.to_string(),
            }),
        )
            .into_response(),
        Err(error) => not_found_or_500(error),
    }
}

fn not_found_or_500(error: ErrGroupManager) -> axum::response::Response {
    let status = match error {
        ErrGroupManager::NotFoundGroup => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

async fn game_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<usize>,
) -> impl IntoResponse {
    let group = match state.manager.get(id) {
        Ok(group) => group,
        Err(error) => return not_found_or_500(error),
    };
    if group.is_full() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "group is full".to_owned(),
            }),
        )
            .into_response();
    }
    ws.on_upgrade(move |socket| async move {
        // the slot may be gone by upgrade time: the worker is simply dropped
        if let Err(error) = group.handle(ConnectionWorker::new(socket)).await {
            tracing::warn!(group = group.id(), %error, "connection rejected");
        }
    })
    .into_response()
}
