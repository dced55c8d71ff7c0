use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    response::Response,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use tracing::info;

use super::created;
use crate::{
    AppState,
    entities::user,
    error::{AppError, AppResult},
    models::{NewUserRequest, NewUserResponse, UserResponse},
};

const MAX_USERNAME_LEN: usize = 50;

pub async fn new_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewUserRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(req) = payload?;
    let (Some(username), Some(password)) = (req.username, req.password) else {
        return Err(AppError::invalid("username and password are required"));
    };
    if username.is_empty() {
        return Err(AppError::invalid("username is required"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::invalid(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }

    let txn = state.db.begin().await?;

    let taken =
        user::Entity::find().filter(user::Column::Username.eq(&username)).one(&txn).await?;
    if taken.is_some() {
        return Err(AppError::conflict(format!("username {username} is taken")));
    }

    let password_hash = state.hasher.hash(&password)?;
    let user = user::ActiveModel {
        username: Set(username),
        password_hash: Set(password_hash),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(user_id = user.id, username = %user.username, "user registered");

    Ok(created(
        format!("/users/{}", user.id),
        NewUserResponse { id: user.id, username: user.username },
    ))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> AppResult<Json<UserResponse>> {
    let txn = state.db.begin().await?;
    let user = user::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::invalid(format!("user {id} not found")))?;
    txn.commit().await?;

    Ok(Json(UserResponse { username: user.username }))
}
