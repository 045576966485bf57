use axum::{Extension, Json, extract::State, http::StatusCode};
use uuid::Uuid;

use ens_db::{Groups, Kind, Recipients};
use ens_types::models::{Group, Recipient};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::Params;
use crate::middleware::AuthUser;
use crate::workflow::Resource;

pub async fn get_active(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Group>>, ApiError> {
    let owner = user.user_id;
    let groups = state.run_db(move |db| db.list_active_groups(owner)).await?;

    Ok(Json(groups.into_iter().map(Groups::entity).collect()))
}

pub async fn get_recipients(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    params: Params,
) -> Result<Json<Vec<Recipient>>, ApiError> {
    let group_id = params.id(Groups::ID_PARAM, Groups::LABEL)?;
    let owner = user.user_id;
    let members = state
        .run_db(move |db| db.group_members(owner, group_id))
        .await?;

    Ok(Json(members.into_iter().map(Recipients::entity).collect()))
}

pub async fn add_recipient(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    params: Params,
) -> Result<StatusCode, ApiError> {
    let (group_id, recipient_id) = membership_ids(&params)?;
    let owner = user.user_id;
    state
        .run_db(move |db| db.add_group_member(owner, group_id, recipient_id))
        .await?;

    Ok(StatusCode::OK)
}

pub async fn delete_recipient(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    params: Params,
) -> Result<StatusCode, ApiError> {
    let (group_id, recipient_id) = membership_ids(&params)?;
    let owner = user.user_id;
    state
        .run_db(move |db| db.remove_group_member(owner, group_id, recipient_id))
        .await?;

    Ok(StatusCode::OK)
}

fn membership_ids(params: &Params) -> Result<(Uuid, Uuid), ApiError> {
    Ok((
        params.id(Groups::ID_PARAM, Groups::LABEL)?,
        params.id(Recipients::ID_PARAM, Recipients::LABEL)?,
    ))
}
