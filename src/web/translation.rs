use std::borrow::Cow;

use axum::{
    extract::{Extension, Multipart, State, multipart::MultipartRejection},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info, warn};

use crate::{
    pipeline::PipelineOutcome,
    web::{
        AppState,
        auth::CurrentUser,
        pages::render_gated,
        session::FlashLevel,
        uploads::{self, ALLOWED_EXTENSIONS, UploadError},
    },
};

/// Multipart field carrying the image.
pub const UPLOAD_FIELD: &str = "imageUpload";

pub async fn translation_page(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> Html<String> {
    let accept = ALLOWED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",");
    let body = format!(
        r#"        <section class="panel">
            <h2>Translate text in an image</h2>
            <form method="post" action="/translate-image" enctype="multipart/form-data">
                <label for="{field}">Choose an image</label>
                <input id="{field}" name="{field}" type="file" accept="{accept}" required>
                <p class="note">Allowed formats: {formats}. The recognised text is translated into English.</p>
                <button type="submit">Extract and translate</button>
            </form>
        </section>"#,
        field = UPLOAD_FIELD,
        accept = accept,
        formats = ALLOWED_EXTENSIONS.join(", "),
    );
    render_gated(&state, &user, &jar, "Translate", Cow::Owned(body)).await
}

pub async fn translate_image(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
    multipart: Result<Multipart, MultipartRejection>,
) -> (CookieJar, Redirect) {
    let sessions = state.sessions();

    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            info!(user = %user.username, %rejection, "upload without a multipart body");
            let jar = sessions
                .flash(jar, FlashLevel::Error, UploadError::NoFile.to_string())
                .await;
            return (jar, Redirect::to("/translation"));
        }
    };

    let saved = match uploads::accept_image(multipart, state.upload_dir(), UPLOAD_FIELD).await {
        Ok(saved) => saved,
        Err(err) => {
            if err.is_internal() {
                error!(?err, "failed to store uploaded image");
            } else {
                info!(user = %user.username, reason = %err, "upload rejected");
            }
            let jar = sessions.flash(jar, FlashLevel::Error, err.to_string()).await;
            return (jar, Redirect::to("/translation"));
        }
    };

    info!(
        user = %user.username,
        original = %saved.original_name,
        stored = %saved.stored_name,
        kind = ?saved.kind,
        bytes = saved.file_size,
        "image uploaded"
    );

    let jar = match state.pipeline().process(&saved.stored_path).await {
        Ok(PipelineOutcome::NoText) => {
            sessions
                .flash(jar, FlashLevel::Info, "No text found in the image.")
                .await
        }
        Ok(PipelineOutcome::Translated {
            extracted,
            translated,
        }) => {
            let jar = sessions
                .flash(jar, FlashLevel::Success, format!("Text extracted: {extracted}"))
                .await;
            sessions
                .flash(jar, FlashLevel::Success, format!("Translated text: {translated}"))
                .await
        }
        Err(err) => {
            warn!(stage = err.stage(), error = %err, file = %saved.stored_name, "image processing failed");
            let jar = match err.extracted() {
                Some(extracted) => {
                    sessions
                        .flash(jar, FlashLevel::Success, format!("Text extracted: {extracted}"))
                        .await
                }
                None => jar,
            };
            sessions.flash(jar, FlashLevel::Error, err.to_string()).await
        }
    };

    (jar, Redirect::to("/translation"))
}
