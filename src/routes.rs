use crate::codec;
use crate::error::AppError;
use crate::models::{ErrorResponse, HealthResponse, RemovalResponse};
use crate::render;
use crate::state::AppState;
use crate::upload::{allowed_file, extension_of, ArtifactNames};
use anyhow::{anyhow, Context};
use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, SignedCookieJar};
use tokio_util::io::ReaderStream;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer};

const FLASH_COOKIE: &str = "flash";
const DOWNLOAD_ERROR: &str = "Error downloading file";
const SELECT_IMAGE: &str = "Please select an image";
const FORMAT_NOT_ALLOWED: &str = "File format not allowed. Please use PNG, JPG, JPEG, WEBP or BMP";

pub fn router(state: AppState) -> Router {
    let upload_dir = state.storage.dir().to_path_buf();
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(index))
        .route("/remove-bg", post(remove_background))
        .route("/download/:filename", get(download))
        .route("/health", get(health))
        .route("/about", get(about))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index(jar: SignedCookieJar) -> (SignedCookieJar, Html<String>) {
    let flash = jar
        .get(FLASH_COOKIE)
        .and_then(|cookie| urlencoding::decode(cookie.value()).ok().map(|msg| msg.into_owned()));
    let jar = match flash {
        Some(_) => jar.remove(Cookie::build(FLASH_COOKIE).path("/")),
        None => jar,
    };
    (jar, Html(render::index(flash.as_deref())))
}

async fn about() -> Html<String> {
    Html(render::about())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

async fn remove_background(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let wants_json = accepts_json(&headers);

    let outcome = match multipart {
        Ok(multipart) => process_upload(&state, multipart).await,
        Err(rejection) => Err(AppError::InvalidUpload(format!("{}: {}", SELECT_IMAGE, rejection.body_text()))),
    };

    match outcome {
        Ok(names) => {
            let storage = state.storage.clone();
            tokio::spawn(async move {
                storage.sweep().await;
            });

            let view = RemovalResponse::new(&names);
            if wants_json {
                Json(view).into_response()
            } else {
                Html(render::result(&view)).into_response()
            }
        }
        Err(e) => {
            match &e {
                AppError::InvalidUpload(msg) => tracing::info!(reason = %msg, "Upload rejected"),
                AppError::Processing(err) => tracing::error!(error = ?err, "Image processing failed"),
            }
            if wants_json {
                (e.status(), Json(ErrorResponse { error: e.to_string() })).into_response()
            } else {
                flash_redirect(jar, &e.to_string())
            }
        }
    }
}

/// Runs validation, removal and storage for one upload; returns the stored pair's names.
#[tracing::instrument(skip_all, fields(file = tracing::field::Empty, remover = state.remover.name()))]
async fn process_upload(state: &AppState, mut multipart: Multipart) -> Result<ArtifactNames, AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidUpload(format!("Could not read upload: {}", e.body_text())))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidUpload(format!("Could not read upload: {}", e.body_text())))?;
        upload = Some((file_name, bytes));
        break;
    }

    let Some((file_name, bytes)) = upload else {
        return Err(AppError::InvalidUpload(SELECT_IMAGE.to_string()));
    };
    if file_name.is_empty() {
        return Err(AppError::InvalidUpload(SELECT_IMAGE.to_string()));
    }
    if !allowed_file(&file_name) {
        return Err(AppError::InvalidUpload(FORMAT_NOT_ALLOWED.to_string()));
    }
    tracing::Span::current().record("file", file_name.as_str());

    let input = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .context("Image decoding task failed")?
        .context("Could not decode image")?;
    tracing::info!(width = input.width(), height = input.height(), "Decoded upload");

    let output = state.remover.remove(&input).await?;
    tracing::info!("Background removed");

    let names = ArtifactNames::generate(&file_name).ok_or_else(|| anyhow!("Upload has no extension"))?;
    let format = extension_of(&file_name)
        .and_then(|ext| codec::format_for_extension(&ext))
        .ok_or_else(|| anyhow!("No encoder for {}", file_name))?;

    let (original_bytes, result_bytes) = tokio::task::spawn_blocking(move || {
        Ok::<_, image::ImageError>((codec::encode(&input, format)?, codec::encode_png(&output)?))
    })
    .await
    .context("Image encoding task failed")?
    .context("Could not encode image")?;

    state.storage.store(&names.original(), &original_bytes).await?;
    state.storage.store(&names.result(), &result_bytes).await?;
    tracing::info!(name = %names.core(), "Stored original and result");

    Ok(names)
}

async fn download(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    tracing::info!(file = %filename, "Download requested");
    match state.storage.open_result(&filename).await {
        Ok(file) => {
            let names = ArtifactNames::from_core(filename);
            let disposition = format!("attachment; filename=\"{}\"", names.download_name());
            (
                [
                    (header::CONTENT_TYPE, "image/png".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                Body::from_stream(ReaderStream::new(file)),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Download failed");
            (StatusCode::INTERNAL_SERVER_ERROR, DOWNLOAD_ERROR).into_response()
        }
    }
}

fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"))
}

fn flash_redirect(jar: SignedCookieJar, message: &str) -> Response {
    let cookie = Cookie::build((FLASH_COOKIE, urlencoding::encode(message).into_owned()))
        .path("/")
        .http_only(true);
    (jar.add(cookie), Redirect::to("/")).into_response()
}
