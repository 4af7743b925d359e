use {
    crate::{
        Config,
        rate_limit::RateLimiter,
        storage::{Lookup, Storage, StoredSite},
    },
    anyhow::{Result, anyhow},
    chrono::Utc,
    http_body_util::{BodyExt, Full, LengthLimitError, Limited},
    hyper::{
        Method, Request, Response, StatusCode,
        body::{Body, Bytes},
        header::{self, HeaderMap, HeaderValue},
    },
    keepsake_protocol::{
        SiteId,
        endpoints::{Acknowledged, CreateSite, ErrorDetail, HealthStatus, Route, SiteCreated},
        limits::{MAX_REQUEST_BODY, check_envelope},
    },
    rand::{Rng, distr::Alphanumeric},
    serde::Serialize,
    std::{convert::Infallible, error::Error as StdError, net::IpAddr, sync::Arc, time::Instant},
    tracing::{debug, info, warn},
};

/// Length of generated site ids.
pub const ID_LENGTH: usize = 8;
const ID_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct Context {
    pub config: Arc<Config>,
    pub storage: Arc<Storage>,
    pub rate_limiter: Arc<RateLimiter>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Site not found")
    }

    fn expired() -> Self {
        Self::new(StatusCode::GONE, "This page has expired")
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        warn!(?err, "handler error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

type ApiResult = Result<Response<Full<Bytes>>, ApiError>;

pub async fn handle<B>(
    ctx: Context,
    peer: IpAddr,
    request: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let origin = allowed_origin(&ctx.config, request.headers());
    let mut response = if request.method() == Method::OPTIONS {
        preflight()
    } else {
        let method = request.method().clone();
        let path = request.uri().path().to_owned();
        match route(&ctx, peer, request).await {
            Ok(response) => response,
            Err(err) => {
                debug!(
                    %method,
                    %path,
                    status = %err.status,
                    detail = %err.detail,
                    "request failed"
                );
                json_response(err.status, &ErrorDetail { detail: err.detail })
            }
        }
    };
    if let Some(origin) = origin {
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
    Ok(response)
}

async fn route<B>(ctx: &Context, peer: IpAddr, request: Request<B>) -> ApiResult
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let route = Route::parse(request.method().as_str(), request.uri().path())
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Not found"))?;
    match route {
        Route::CreateSite => create_site(ctx, peer, request.into_body()).await,
        Route::GetSite(id) => get_site(ctx, id).await,
        Route::RecordView(id) => record_view(ctx, id).await,
        Route::AcceptSite(id) => accept_site(ctx, id).await,
        Route::Health => Ok(json_response(
            StatusCode::OK,
            &HealthStatus {
                status: "ok".into(),
                storage: ctx.storage.is_available(),
            },
        )),
    }
}

/// Runs a storage call on the blocking pool.
async fn blocking<T, F>(ctx: &Context, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Storage) -> Result<T> + Send + 'static,
{
    let storage = Arc::clone(&ctx.storage);
    tokio::task::spawn_blocking(move || f(&storage)).await?
}

fn generate_site_id() -> Result<SiteId> {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LENGTH)
        .map(char::from)
        .collect::<String>()
        .parse()
}

async fn read_body<B>(body: B) -> Result<Bytes, ApiError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    match Limited::new(body, MAX_REQUEST_BODY).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => Err(ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body is too large",
        )),
        Err(err) => {
            debug!(%err, "failed to read request body");
            Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
            ))
        }
    }
}

async fn create_site<B>(ctx: &Context, peer: IpAddr, body: B) -> ApiResult
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    if !ctx.rate_limiter.try_acquire(peer, Instant::now()) {
        info!(%peer, "creation rate limit exceeded");
        return Err(ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Try again later.",
        ));
    }
    let body = read_body(body).await?;
    let envelope: CreateSite = serde_json::from_slice(&body).map_err(|err| {
        ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("invalid request body: {err}"),
        )
    })?;
    check_envelope(&envelope)
        .map_err(|err| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()))?;

    let now = Utc::now();
    let expires_at = ctx.config.expiry_for(now)?;
    for _ in 0..ID_ATTEMPTS {
        let site = StoredSite {
            id: generate_site_id()?,
            envelope: envelope.clone(),
            created_at: now,
            view_count: 0,
            accepted_at: None,
            expires_at,
        };
        let id = site.id.clone();
        if blocking(ctx, move |storage| storage.create(&site)).await? {
            info!(%id, ?expires_at, "site created");
            let base_address = ctx.config.page_address(&id)?;
            return Ok(json_response(
                StatusCode::OK,
                &SiteCreated { id, base_address },
            ));
        }
    }
    Err(anyhow!("no free site id after {ID_ATTEMPTS} attempts").into())
}

fn found(lookup: Lookup) -> Result<StoredSite, ApiError> {
    match lookup {
        Lookup::Found(site) => Ok(site),
        Lookup::Expired => Err(ApiError::expired()),
        Lookup::Missing => Err(ApiError::not_found()),
    }
}

async fn get_site(ctx: &Context, id: SiteId) -> ApiResult {
    let site = found(blocking(ctx, move |storage| storage.get(&id, Utc::now())).await?)?;
    Ok(json_response(StatusCode::OK, &site.to_response()))
}

async fn record_view(ctx: &Context, id: SiteId) -> ApiResult {
    let lookup = blocking(ctx, move |storage| {
        storage.update(&id, Utc::now(), |site| {
            site.view_count = site.view_count.saturating_add(1);
        })
    })
    .await?;
    let site = found(lookup)?;
    debug!(id = %site.id, view_count = site.view_count, "view recorded");
    Ok(json_response(StatusCode::OK, &Acknowledged { success: true }))
}

async fn accept_site(ctx: &Context, id: SiteId) -> ApiResult {
    let lookup = blocking(ctx, move |storage| {
        let now = Utc::now();
        storage.update(&id, now, |site| {
            site.accepted_at.get_or_insert(now);
        })
    })
    .await?;
    let site = found(lookup)?;
    info!(id = %site.id, accepted_at = ?site.accepted_at, "site accepted");
    Ok(json_response(StatusCode::OK, &Acknowledged { success: true }))
}

fn allowed_origin(config: &Config, headers: &HeaderMap) -> Option<HeaderValue> {
    let origin = headers.get(header::ORIGIN)?;
    let text = origin.to_str().ok()?;
    config
        .cors_origins
        .iter()
        .any(|allowed| allowed == "*" || allowed == text)
        .then(|| origin.clone())
}

fn preflight() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::default());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("600"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let (status, body) = match serde_json::to_vec(body) {
        Ok(body) => (status, body),
        Err(err) => {
            warn!(?err, "failed to serialize response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"detail":"Internal server error"}"#.to_vec(),
            )
        }
    };
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test")]
mod tests {
    use {
        super::*,
        keepsake_protocol::{EncryptedEnvelope, endpoints::SiteResponse},
        serde::de::DeserializeOwned,
        serde_json::json,
        std::{net::Ipv4Addr, time::Duration},
        tempfile::TempDir,
    };

    const PEER: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn setup(config: Config) -> (TempDir, Context) {
        let dir = TempDir::new().unwrap();
        let ctx = Context {
            storage: Arc::new(Storage::new(dir.path().into()).unwrap()),
            rate_limiter: Arc::new(RateLimiter::new(
                config.rate_limit_per_hour,
                crate::rate_limit::WINDOW,
            )),
            config: Arc::new(config),
        };
        (dir, ctx)
    }

    fn config() -> Config {
        json5::from_str(
            r#"{
                bind_addr: "127.0.0.1:0",
                storage_path: "/nonexistent",
                public_base_url: "https://keepsake.example/",
                cors_origins: ["https://keepsake.example"],
            }"#,
        )
        .unwrap()
    }

    fn envelope_json() -> serde_json::Value {
        json!({ "ciphertext": "c2VhbGVk", "nonce": "AAAAAAAAAAAAAAAA" })
    }

    async fn call(
        ctx: &Context,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> Response<Full<Bytes>> {
        let body = body.map_or_else(Bytes::new, |body| Bytes::from(body.to_string()));
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(body))
            .unwrap();
        handle(ctx.clone(), PEER, request).await.unwrap()
    }

    async fn read_json<T: DeserializeOwned>(response: Response<Full<Bytes>>) -> T {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create(ctx: &Context) -> SiteCreated {
        let response = call(ctx, "POST", "/api/sites", Some(envelope_json())).await;
        assert_eq!(response.status(), StatusCode::OK);
        read_json(response).await
    }

    #[tokio::test]
    async fn create_and_fetch() {
        let (_dir, ctx) = setup(config());
        let created = create(&ctx).await;
        assert_eq!(created.id.as_str().len(), ID_LENGTH);
        assert!(created.id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(
            created.base_address,
            format!("https://keepsake.example/v/{}", created.id)
        );

        let response = call(&ctx, "GET", &format!("/api/sites/{}", created.id), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let site: SiteResponse = read_json(response).await;
        assert_eq!(
            site.envelope,
            EncryptedEnvelope {
                ciphertext: "c2VhbGVk".into(),
                nonce: "AAAAAAAAAAAAAAAA".into(),
            }
        );
        assert_eq!(site.view_count, 0);
        assert!(!site.accepted);
    }

    #[tokio::test]
    async fn invalid_bodies_are_unprocessable() {
        let (_dir, ctx) = setup(config());
        for body in [
            json!({ "ciphertext": "c2VhbGVk" }),
            json!({ "ciphertext": "c2VhbGVk", "nonce": "short" }),
            json!({ "ciphertext": "", "nonce": "AAAAAAAAAAAAAAAA" }),
            json!("not an object"),
        ] {
            let response = call(&ctx, "POST", "/api/sites", Some(body)).await;
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
            let detail: ErrorDetail = read_json(response).await;
            assert!(!detail.detail.is_empty());
        }
    }

    #[tokio::test]
    async fn view_and_accept() {
        let (_dir, ctx) = setup(config());
        let created = create(&ctx).await;
        let site_path = format!("/api/sites/{}", created.id);
        for _ in 0..2 {
            let response = call(&ctx, "POST", &format!("{site_path}/view"), None).await;
            assert_eq!(response.status(), StatusCode::OK);
            let ack: Acknowledged = read_json(response).await;
            assert!(ack.success);
        }
        for _ in 0..2 {
            let response = call(&ctx, "POST", &format!("{site_path}/accept"), None).await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        let site: SiteResponse = read_json(call(&ctx, "GET", &site_path, None).await).await;
        assert_eq!(site.view_count, 2);
        assert!(site.accepted);
    }

    #[tokio::test]
    async fn missing_site() {
        let (_dir, ctx) = setup(config());
        for (method, uri) in [
            ("GET", "/api/sites/nothere1"),
            ("POST", "/api/sites/nothere1/view"),
            ("POST", "/api/sites/nothere1/accept"),
        ] {
            let response = call(&ctx, method, uri, None).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            let detail: ErrorDetail = read_json(response).await;
            assert_eq!(detail.detail, "Site not found");
        }
        let response = call(&ctx, "GET", "/api/unknown", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn expired_site_is_gone() {
        let mut config = config();
        config.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        let (_dir, ctx) = setup(config);
        let created = create(&ctx).await;
        let site_path = format!("/api/sites/{}", created.id);
        for (method, uri) in [
            ("GET", site_path.clone()),
            ("POST", format!("{site_path}/view")),
            ("POST", format!("{site_path}/accept")),
        ] {
            let response = call(&ctx, method, &uri, None).await;
            assert_eq!(response.status(), StatusCode::GONE);
        }
    }

    #[tokio::test]
    async fn lifetime_sets_expiry() {
        let mut config = config();
        config.site_lifetime = Some(Duration::from_secs(3600));
        let (_dir, ctx) = setup(config);
        let created = create(&ctx).await;
        let Lookup::Found(site) = ctx.storage.get(&created.id, Utc::now()).unwrap() else {
            unreachable!("site was just created");
        };
        let expires_at = site.expires_at.unwrap();
        assert_eq!(expires_at - site.created_at, chrono::Duration::hours(1));
    }

    #[tokio::test]
    async fn rate_limited_per_address() {
        let mut config = config();
        config.rate_limit_per_hour = 2;
        let (_dir, ctx) = setup(config);
        create(&ctx).await;
        create(&ctx).await;
        let response = call(&ctx, "POST", "/api/sites", Some(envelope_json())).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let detail: ErrorDetail = read_json(response).await;
        assert!(detail.detail.contains("Rate limit"));
    }

    #[tokio::test]
    async fn health() {
        let (_dir, ctx) = setup(config());
        let health: HealthStatus = read_json(call(&ctx, "GET", "/api/health", None).await).await;
        assert_eq!(health.status, "ok");
        assert!(health.storage);
    }

    #[tokio::test]
    async fn cors() {
        let (_dir, ctx) = setup(config());
        let request = |origin: &str| {
            Request::builder()
                .method("OPTIONS")
                .uri("/api/sites")
                .header(header::ORIGIN, origin)
                .body(Full::<Bytes>::default())
                .unwrap()
        };

        let response = handle(ctx.clone(), PEER, request("https://keepsake.example"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://keepsake.example"
        );

        let response = handle(ctx, PEER, request("https://evil.example"))
            .await
            .unwrap();
        assert!(
            !response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }
}
