use crate::{
    app::AppContext,
    classify::Classification,
    config::Config,
    errors::AppError,
    search::{SearchResult, DEFAULT_LIMIT},
};
use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{collections::HashMap, sync::Arc};
use tokio::signal;
use tower::ServiceBuilder;

type SharedState = Arc<AppContext>;

pub fn router(ctx: SharedState) -> Router {
    let max_upload = ctx.config().max_upload_bytes();

    Router::new()
        .route("/index", post(index))
        .route("/search", post(search))
        .route("/search-text", post(search_text))
        .route("/classify", post(classify))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(
                    tower_http::trace::TraceLayer::new_for_http()
                        .make_span_with(
                            tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                        )
                        .on_response(
                            tower_http::trace::DefaultOnResponse::new()
                                .level(tracing::Level::INFO),
                        ),
                )
                .layer(DefaultBodyLimit::max(max_upload)),
        )
        .with_state(ctx)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

async fn start_app(config: Config) -> anyhow::Result<()> {
    let bind_addr = config.bind_addr.clone();
    let ctx = AppContext::bootstrap(config)
        .await
        .context("service startup failed")?;

    let app = router(Arc::new(ctx));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("cannot bind {bind_addr}"))?;
    log::info!("listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    Ok(())
}

pub fn start_daemon(config: Config) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?
        .block_on(start_app(config))
}

#[derive(Debug)]
struct HttpError(AppError);

// Every error is a 500 carrying the message.
impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        match &self.0 {
            AppError::InvalidInput(_) => log::warn!("{}", self.0),
            _ => log::error!("{:?}", self.0),
        }

        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": self.0.to_string()})),
        )
            .into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Text fields and the `file` part of a multipart upload.
#[derive(Default)]
struct Upload {
    fields: HashMap<String, String>,
    file: Option<Bytes>,
}

impl Upload {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut upload = Upload::default();

        while let Some(field) = multipart.next_field().await.map_err(invalid)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                upload.file = Some(field.bytes().await.map_err(invalid)?);
            } else {
                let value = field.text().await.map_err(invalid)?;
                upload.fields.insert(name, value);
            }
        }

        Ok(upload)
    }

    fn file(&self) -> Result<&[u8], AppError> {
        self.file
            .as_deref()
            .ok_or_else(|| AppError::InvalidInput("missing 'file' field".to_string()))
    }

    fn field(&self, name: &str) -> Result<&str, AppError> {
        self.fields
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AppError::InvalidInput(format!("missing '{name}' field")))
    }

    fn limit(&self) -> Result<usize, AppError> {
        parse_limit(self.fields.get("limit").map(String::as_str))
    }
}

fn invalid<E: std::fmt::Display>(err: E) -> AppError {
    AppError::InvalidInput(err.to_string())
}

fn parse_limit(raw: Option<&str>) -> Result<usize, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_LIMIT),
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("limit '{raw}' is not a number"))),
    }
}

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    ok: bool,
    results: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
struct ClassifyResponse {
    ok: bool,
    #[serde(flatten)]
    classification: Classification,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    collection: String,
    dimension: usize,
    model: String,
    points: u64,
}

async fn index(
    State(ctx): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<OkResponse>, HttpError> {
    let upload = Upload::read(multipart).await?;

    let listing_id = upload.field("listing_id")?;
    let image_url = upload.field("image_url")?;
    let image = upload.file()?;

    ctx.search().index_image(listing_id, image_url, image).await?;

    Ok(Json(OkResponse { ok: true }))
}

async fn search(
    State(ctx): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<SearchResponse>, HttpError> {
    let upload = Upload::read(multipart).await?;

    let limit = upload.limit()?;
    let results = ctx.search().search_by_image(upload.file()?, limit).await?;

    Ok(Json(SearchResponse { ok: true, results }))
}

#[derive(Debug, Deserialize)]
struct TextQuery {
    #[serde(default)]
    q: String,
    limit: Option<String>,
}

/// Accepts either `multipart/form-data` or a urlencoded form.
async fn search_text(
    State(ctx): State<SharedState>,
    request: Request,
) -> Result<Json<SearchResponse>, HttpError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let (q, limit) = if is_multipart {
        let multipart = Multipart::from_request(request, &()).await.map_err(invalid)?;
        let upload = Upload::read(multipart).await?;
        let q = upload.fields.get("q").cloned().unwrap_or_default();
        (q, upload.limit()?)
    } else {
        let Form(query) = Form::<TextQuery>::from_request(request, &())
            .await
            .map_err(invalid)?;
        let limit = parse_limit(query.limit.as_deref())?;
        (query.q, limit)
    };

    let results = ctx.search().search_by_text(&q, limit).await?;

    Ok(Json(SearchResponse { ok: true, results }))
}

async fn classify(
    State(ctx): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<ClassifyResponse>, HttpError> {
    let upload = Upload::read(multipart).await?;

    let classification = ctx.classifier().classify(upload.file()?).await?;

    Ok(Json(ClassifyResponse {
        ok: true,
        classification,
    }))
}

async fn health(State(ctx): State<SharedState>) -> Result<Json<HealthResponse>, HttpError> {
    let collection = &ctx.config().collection;
    let points = ctx.store().count(collection).await?;

    Ok(Json(HealthResponse {
        ok: true,
        collection: collection.clone(),
        dimension: ctx.dimension(),
        model: ctx.embedder().model_name().to_string(),
        points,
    }))
}
