//! Uploaded documents.

use super::patient_url;
use crate::auth::{ActiveRole, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::forms::DocumentForm;
use crate::AppState;
use axum::extract::{Multipart, Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::Form;
use osler_core::records::Document;
use osler_core::ShardableUuid;

struct Upload {
    form: DocumentForm,
    content: Vec<u8>,
    filename: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let bad_upload = |e: axum::extract::multipart::MultipartError| {
        ApiError::BadRequest(format!("invalid upload: {e}"))
    };

    let mut form = DocumentForm::default();
    let mut file: Option<(Vec<u8>, Option<String>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_upload)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = field.text().await.map_err(bad_upload)?,
            "document_type" => form.document_type = field.text().await.map_err(bad_upload)?,
            "comments" => form.comments = field.text().await.map_err(bad_upload)?,
            "file" | "image" => {
                let filename = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad_upload)?;
                file = Some((bytes.to_vec(), filename));
            }
            other => tracing::debug!(field = other, "ignoring unknown upload field"),
        }
    }

    let (content, filename) =
        file.ok_or_else(|| ApiError::BadRequest("file is required".into()))?;
    if content.is_empty() {
        return Err(ApiError::BadRequest("file is empty".into()));
    }
    Ok(Upload {
        form,
        content,
        filename,
    })
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn document_create(
    State(state): State<AppState>,
    Path(id): Path<ShardableUuid>,
    active: ActiveRole,
    multipart: Multipart,
) -> ApiResult<Redirect> {
    let upload = read_upload(multipart).await?;
    let document = state.clinic.notes.create_document(
        &active.acting(),
        &id,
        upload.form.into(),
        &upload.content,
        upload.filename.as_deref(),
    )?;
    tracing::info!(patient = %id, document = %document.meta.id, "document uploaded");
    Ok(Redirect::to(&patient_url(&id)))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn document_detail(
    State(state): State<AppState>,
    Path((id, doc)): Path<(ShardableUuid, ShardableUuid)>,
    _user: CurrentUser,
) -> ApiResult<Json<Document>> {
    Ok(Json(state.clinic.notes.document(&id, &doc)?))
}

/// Update a document's title, type and comments; the stored file is unchanged.
#[axum::debug_handler(state = AppState)]
pub(crate) async fn document_update(
    State(state): State<AppState>,
    Path((id, doc)): Path<(ShardableUuid, ShardableUuid)>,
    active: ActiveRole,
    Form(form): Form<DocumentForm>,
) -> ApiResult<Redirect> {
    state
        .clinic
        .notes
        .update_document(&active.acting(), &id, &doc, form.into())?;
    Ok(Redirect::to(&format!("{}/documents/{doc}", patient_url(&id))))
}

#[axum::debug_handler(state = AppState)]
pub(crate) async fn document_file(
    State(state): State<AppState>,
    Path((id, doc)): Path<(ShardableUuid, ShardableUuid)>,
    _user: CurrentUser,
) -> ApiResult<Response> {
    let (document, bytes) = state.clinic.notes.document_file(&id, &doc)?;
    let content_type = document
        .image
        .media_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(([(CONTENT_TYPE, content_type)], bytes).into_response())
}
