//! Staff chat handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use shared::{Chat, ChatSummary, Message, Permission};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_permission, CurrentUser};
use crate::services::chat::{
    ChatFilter, ChatService, CreateChatInput, MessageQuery, SendMessageInput,
};
use crate::AppState;

fn chat_service(state: &AppState) -> ChatService {
    ChatService::new(state.db.clone(), state.events.clone())
}

pub async fn list_chats(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(filter): Query<ChatFilter>,
) -> AppResult<Json<Vec<ChatSummary>>> {
    require_permission(&current_user.0, Permission::Chat)?;

    let chats = chat_service(&state)
        .list_chats(current_user.0.user_id, filter)
        .await?;
    Ok(Json(chats))
}

pub async fn create_chat(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<CreateChatInput>,
) -> AppResult<(StatusCode, Json<Chat>)> {
    require_permission(&current_user.0, Permission::Chat)?;

    let chat = chat_service(&state)
        .create_chat(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

pub async fn get_chat(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(chat_id): Path<Uuid>,
) -> AppResult<Json<Chat>> {
    require_permission(&current_user.0, Permission::Chat)?;

    let chat = chat_service(&state).get_chat(chat_id).await?;
    Ok(Json(chat))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(chat_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
) -> AppResult<Json<Vec<Message>>> {
    require_permission(&current_user.0, Permission::Chat)?;

    let messages = chat_service(&state).list_messages(chat_id, query).await?;
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(chat_id): Path<Uuid>,
    Json(input): Json<SendMessageInput>,
) -> AppResult<(StatusCode, Json<Message>)> {
    require_permission(&current_user.0, Permission::Chat)?;

    let message = chat_service(&state)
        .send_message(current_user.0.user_id, chat_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn close_chat(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(chat_id): Path<Uuid>,
) -> AppResult<Json<Chat>> {
    require_permission(&current_user.0, Permission::Chat)?;

    let chat = chat_service(&state).close_chat(chat_id).await?;
    Ok(Json(chat))
}

pub async fn reopen_chat(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(chat_id): Path<Uuid>,
) -> AppResult<Json<Chat>> {
    require_permission(&current_user.0, Permission::Chat)?;

    let chat = chat_service(&state).reopen_chat(chat_id).await?;
    Ok(Json(chat))
}

pub async fn mark_chat_read(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(chat_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_permission(&current_user.0, Permission::Chat)?;

    chat_service(&state)
        .mark_read(current_user.0.user_id, chat_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
