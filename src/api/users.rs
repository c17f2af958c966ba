// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The CRUD demo service: create and list users.
//!
//! The store is in-memory; persistence is interchangeable application logic
//! as far as the instrumentation core is concerned. Each handler runs under
//! its own operation, and successful creates feed the `users_created_total`
//! counter.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::Fault;
use crate::telemetry::{Counter, Labels, MetricError, Telemetry};

use super::{health, ApiError};

/// A stored user.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Payload for user creation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
}

/// In-memory user store.
#[derive(Debug, Default)]
pub struct UserStore {
    users: RwLock<Vec<User>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, payload: CreateUser) -> User {
        let user = User {
            id: Uuid::new_v4(),
            name: payload.name,
            email: payload.email,
        };
        self.users.write().await.push(user.clone());
        user
    }

    pub async fn list(&self) -> Vec<User> {
        self.users.read().await.clone()
    }
}

#[derive(Clone)]
struct AppState {
    telemetry: Arc<Telemetry>,
    store: Arc<UserStore>,
    users_created: Counter,
}

/// Build the users-api router.
pub fn router(telemetry: Arc<Telemetry>) -> Result<Router, MetricError> {
    let users_created = telemetry
        .registry()
        .counter("users_created_total", "Number of users created")?;
    let state = AppState {
        telemetry,
        store: Arc::new(UserStore::new()),
        users_created,
    };
    Ok(Router::new()
        .route("/health", get(health))
        .route("/users", post(create_user).get(list_users))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http()))
}

/// Create a new user and record metrics.
async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUser>,
) -> Result<Json<User>, ApiError> {
    let store = state.store.clone();
    let users_created = state.users_created.clone();
    let user = state
        .telemetry
        .operation("create_user")
        .run(move || async move {
            let name = payload.name.trim().to_string();
            if name.is_empty() {
                return Err(Fault::validation("name must not be empty"));
            }
            let email = payload.email.trim().to_string();
            if email.is_empty() || !email.contains('@') {
                return Err(Fault::validation("email must be a valid address"));
            }
            let user = store.insert(CreateUser { name, email }).await;
            if let Err(err) = users_created.add(1.0, &Labels::new()) {
                tracing::debug!(error = %err, "users_created counter not updated");
            }
            Ok::<_, Fault>(user)
        })
        .await?;
    Ok(Json(user))
}

/// List all users.
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let store = state.store.clone();
    let users = state
        .telemetry
        .operation("list_users")
        .run(move || async move { Ok::<_, Fault>(store.list().await) })
        .await?;
    Ok(Json(users))
}
