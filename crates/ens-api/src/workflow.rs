//! Draft/confirm handlers, written once and mounted for every resource.
//!
//! ```text
//! POST   /{resource}/create            body: fields        -> draft
//! PUT    /{resource}/confirmCreation   ?draft_id=          -> entity
//! GET    /{resource}                   ?{id_param}=        -> entity
//! GET    /{resource}/all                                   -> [entity]
//! PUT    /{resource}/modify...         ?{id_param}= body   -> entity
//! DELETE /{resource}/delete...         ?{id_param}=
//! ```

use axum::{Extension, Json, extract::State, http::StatusCode};
use serde::{Serialize, de::DeserializeOwned};

use ens_db::{Groups, Kind, Recipients, Record, Templates};
use ens_types::models::{Draft, Group, Recipient, Template};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{Params, Payload};
use crate::middleware::AuthUser;

/// A store kind exposed over HTTP: how its id is named in query strings and
/// how a committed row is rendered.
pub trait Resource: Kind<Fields: Serialize + DeserializeOwned> {
    type Entity: Serialize + Send;

    const ID_PARAM: &'static str;

    fn entity(record: Record<Self::Fields>) -> Self::Entity;
}

impl Resource for Recipients {
    type Entity = Recipient;
    const ID_PARAM: &'static str = "recipient_id";

    fn entity(record: Record<Self::Fields>) -> Recipient {
        Recipient {
            recipient_id: record.id,
            master_id: record.owner,
            fields: record.fields,
        }
    }
}

impl Resource for Templates {
    type Entity = Template;
    const ID_PARAM: &'static str = "template_id";

    fn entity(record: Record<Self::Fields>) -> Template {
        Template {
            notification_template_id: record.id,
            master_id: record.owner,
            fields: record.fields,
        }
    }
}

impl Resource for Groups {
    type Entity = Group;
    const ID_PARAM: &'static str = "group_id";

    fn entity(record: Record<Self::Fields>) -> Group {
        Group {
            recipient_group_id: record.id,
            master_id: record.owner,
            fields: record.fields,
        }
    }
}

pub async fn create<R: Resource>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Payload(fields): Payload<R::Fields>,
) -> Result<Json<Draft<R::Fields>>, ApiError> {
    let owner = user.user_id;
    let record = state
        .run_db(move |db| db.insert_draft::<R>(owner, &fields))
        .await?;

    Ok(Json(Draft {
        draft_id: record.id,
        master_id: record.owner,
        fields: record.fields,
    }))
}

pub async fn confirm<R: Resource>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    params: Params,
) -> Result<Json<R::Entity>, ApiError> {
    let draft_id = params.id("draft_id", R::DRAFT_LABEL)?;
    let owner = user.user_id;
    let record = state
        .run_db(move |db| db.confirm_draft::<R>(owner, draft_id))
        .await?;

    Ok(Json(R::entity(record)))
}

pub async fn get<R: Resource>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    params: Params,
) -> Result<Json<R::Entity>, ApiError> {
    let id = params.id(R::ID_PARAM, R::LABEL)?;
    let owner = user.user_id;
    let record = state.run_db(move |db| db.get_entity::<R>(owner, id)).await?;

    Ok(Json(R::entity(record)))
}

pub async fn get_all<R: Resource>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<R::Entity>>, ApiError> {
    let owner = user.user_id;
    let records = state.run_db(move |db| db.list_entities::<R>(owner)).await?;

    Ok(Json(records.into_iter().map(R::entity).collect()))
}

pub async fn modify<R: Resource>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    params: Params,
    Payload(fields): Payload<R::Fields>,
) -> Result<Json<R::Entity>, ApiError> {
    let id = params.id(R::ID_PARAM, R::LABEL)?;
    let owner = user.user_id;
    let record = state
        .run_db(move |db| db.update_entity::<R>(owner, id, &fields))
        .await?;

    Ok(Json(R::entity(record)))
}

pub async fn delete<R: Resource>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    params: Params,
) -> Result<StatusCode, ApiError> {
    let id = params.id(R::ID_PARAM, R::LABEL)?;
    let owner = user.user_id;
    state.run_db(move |db| db.delete_entity::<R>(owner, id)).await?;

    Ok(StatusCode::OK)
}
