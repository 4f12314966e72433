use crate::{
    error::{
        error_details,
        Error,
        Result,
    },
    observer::{
        RequestEvent,
        RequestObserver,
    },
    rate_limit::{
        is_rate_limited,
        retry_wait,
        RateLimit,
        MIN_RETRY_CEILING,
    },
};
use chrono::Utc;
use futures::stream::{
    BoxStream,
    StreamExt as _,
};
use reqwest::header::{
    HeaderMap,
    HeaderValue,
    AUTHORIZATION,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;
use std::{
    collections::VecDeque,
    fmt,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::Duration,
};
use strum::{
    Display,
    EnumString,
};
use tokio::time::Instant;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.unsplash.com";
pub const DEFAULT_USER_AGENT: &str = "unsplash-stats-tracker/0.1";
/// The API refuses larger pages.
pub const MAX_PER_PAGE: usize = 30;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Resolution {
    #[default]
    Days,
}

#[derive(Clone)]
pub struct ClientConfig {
    pub access_key: String,
    pub base_url: Url,
    pub user_agent: String,
    pub timeout: Duration,
    /// Floor for the spacing between two requests.
    pub min_request_interval: Duration,
    /// Upper bound for a single rate limit wait. Never below five seconds.
    pub rate_limit_retry_max_sleep: Duration,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("access_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("min_request_interval", &self.min_request_interval)
            .field("rate_limit_retry_max_sleep", &self.rate_limit_retry_max_sleep)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(access_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            min_request_interval: Duration::ZERO,
            rate_limit_retry_max_sleep: Duration::from_secs(1800),
        }
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    pub fn with_rate_limit_retry_max_sleep(mut self, ceiling: Duration) -> Self {
        self.rate_limit_retry_max_sleep = ceiling;
        self
    }
}

/// Limits for [`UnsplashClient::iterate_account_photos`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    pub per_page: usize,
    pub max_pages: Option<usize>,
    pub max_items: Option<usize>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            per_page: MAX_PER_PAGE,
            max_pages: None,
            max_items: None,
        }
    }
}

#[derive(Debug, Default)]
struct ClientState {
    min_request_interval: Duration,
    last_request_at: Option<Instant>,
    rate_limit: RateLimit,
    request_count: u64,
}

/// GET-only client for the Unsplash statistics endpoints.
///
/// Requests are spaced by the configured minimum interval, and rate limit
/// responses are slept off and retried until they go through. Every request
/// performed is reported to the optional [`RequestObserver`].
pub struct UnsplashClient {
    http: reqwest::Client,
    base_url: String,
    retry_ceiling: Duration,
    observer: Option<Arc<dyn RequestObserver>>,
    state: Mutex<ClientState>,
}

impl fmt::Debug for UnsplashClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsplashClient")
            .field("base_url", &self.base_url)
            .field("retry_ceiling", &self.retry_ceiling)
            .field("state", &*self.state())
            .finish_non_exhaustive()
    }
}

impl UnsplashClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let access_key = config.access_key.trim();
        if access_key.is_empty() {
            return Err(Error::MissingAccessKey);
        }

        let mut authorization =
            HeaderValue::from_str(&format!("Client-ID {access_key}")).map_err(|_| Error::InvalidAccessKey)?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("Accept-Version", HeaderValue::from_static("v1"));
        headers.insert(AUTHORIZATION, authorization);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(Error::Transport)?;

        Ok(Self {
            http,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            retry_ceiling: config.rate_limit_retry_max_sleep.max(MIN_RETRY_CEILING),
            observer: None,
            state: Mutex::new(ClientState {
                min_request_interval: config.min_request_interval,
                ..Default::default()
            }),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Quota values seen on the most recent response.
    pub fn rate_limit(&self) -> RateLimit {
        self.state().rate_limit
    }

    pub fn request_count(&self) -> u64 {
        self.state().request_count
    }

    pub fn min_request_interval(&self) -> Duration {
        self.state().min_request_interval
    }

    pub fn set_min_request_interval(&self, interval: Duration) {
        self.state().min_request_interval = interval;
    }

    pub fn retry_ceiling(&self) -> Duration {
        self.retry_ceiling
    }

    pub async fn get_account(&self, username: &str) -> Result<Value> {
        self.get_json(&format!("/users/{username}"), &[]).await
    }

    pub async fn get_account_statistics(&self, username: &str, resolution: Resolution, quantity: u32) -> Result<Value> {
        self.get_json(
            &format!("/users/{username}/statistics"),
            &[("resolution", resolution.to_string()), ("quantity", quantity.to_string())],
        )
        .await
    }

    pub async fn get_photo_statistics(&self, photo_id: &str, resolution: Resolution, quantity: u32) -> Result<Value> {
        self.get_json(
            &format!("/photos/{photo_id}/statistics"),
            &[("resolution", resolution.to_string()), ("quantity", quantity.to_string())],
        )
        .await
    }

    /// Streams the account's photos, newest first, one page at a time.
    ///
    /// Paging stops after a short page, an empty or non-list page, or once
    /// either limit in `options` is reached. The stream ends after the first
    /// error.
    pub fn iterate_account_photos<'a>(&'a self, username: &'a str, options: PageOptions) -> BoxStream<'a, Result<Value>> {
        futures::stream::try_unfold(Pager::new(options), move |mut pager| async move {
            let photo = pager.next_photo(self, username).await?;
            Ok::<_, Error>(photo.map(|photo| (photo, pager)))
        })
        .boxed()
    }

    async fn photos_page(&self, username: &str, page: usize, per_page: usize) -> Result<Value> {
        self.get_json(
            &format!("/users/{username}/photos"),
            &[
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
                ("order_by", "latest".to_string()),
            ],
        )
        .await
    }

    async fn wait_for_request_slot(&self) {
        let wait = {
            let state = self.state();
            match state.last_request_at {
                Some(last) if !state.min_request_interval.is_zero() => {
                    state.min_request_interval.saturating_sub(last.elapsed())
                }
                _ => Duration::ZERO,
            }
        };

        if !wait.is_zero() {
            info!(wait_secs = wait.as_secs_f64(), "sleeping to respect request throttle");
            tokio::time::sleep(wait).await;
        }
    }

    /// Books a received response: timestamp, quota headers and request count.
    fn record_response(&self, headers: &HeaderMap) -> (u64, RateLimit, Duration) {
        let mut state = self.state();
        state.last_request_at = Some(Instant::now());
        state.rate_limit.update(headers);
        state.request_count += 1;
        (state.request_count, state.rate_limit, state.min_request_interval)
    }

    /// `headers` is set when the response arrived but its body could not be read.
    fn transport_failure(&self, path: &str, headers: Option<&HeaderMap>, err: reqwest::Error) -> Error {
        let request_count = match headers {
            Some(headers) => self.record_response(headers).0,
            None => {
                let mut state = self.state();
                state.request_count += 1;
                state.request_count
            }
        };
        warn!(path, "request failed without a response: {err}");
        self.notify(&RequestEvent {
            path,
            status_code: 0,
            request_count,
            response: None,
            rate_limited: false,
            rate_limit_wait: None,
        });
        Error::Transport(err)
    }

    fn notify(&self, event: &RequestEvent<'_>) {
        debug!(
            path = event.path,
            status = event.status_code,
            count = event.request_count,
            "request completed"
        );
        if let Some(observer) = &self.observer {
            observer.on_request_completed(event);
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut rate_limit_hits = 0u32;

        loop {
            self.wait_for_request_slot().await;

            let response = match self.http.get(&url).query(query).send().await {
                Ok(response) => response,
                Err(err) => return Err(self.transport_failure(path, None, err)),
            };
            let status = response.status();
            let headers = response.headers().clone();
            let body = match response.text().await {
                Ok(body) => body,
                Err(err) => return Err(self.transport_failure(path, Some(&headers), err)),
            };
            let (request_count, rate_limit, min_request_interval) = self.record_response(&headers);

            if status.is_success() {
                let decoded = if body.trim().is_empty() {
                    Ok(Value::Object(Default::default()))
                } else {
                    serde_json::from_str::<Value>(&body).map_err(|source| Error::Decode {
                        path: path.to_string(),
                        status: status.as_u16(),
                        source,
                    })
                };
                self.notify(&RequestEvent {
                    path,
                    status_code: status.as_u16(),
                    request_count,
                    response: decoded.as_ref().ok(),
                    rate_limited: false,
                    rate_limit_wait: None,
                });
                return decoded;
            }

            let (message, payload) = error_details(&body, status.canonical_reason().unwrap_or("Unknown error"));

            if is_rate_limited(status.as_u16(), rate_limit.remaining, &message, payload.as_ref()) {
                let wait = retry_wait(
                    &headers,
                    rate_limit_hits,
                    min_request_interval,
                    self.retry_ceiling,
                    Utc::now(),
                );
                rate_limit_hits = rate_limit_hits.saturating_add(1);
                warn!(
                    status = status.as_u16(),
                    remaining = ?rate_limit.remaining,
                    wait_secs = wait.as_secs_f64(),
                    "rate limit response received, sleeping before retrying"
                );
                self.notify(&RequestEvent {
                    path,
                    status_code: status.as_u16(),
                    request_count,
                    response: None,
                    rate_limited: true,
                    rate_limit_wait: Some(wait),
                });
                tokio::time::sleep(wait).await;
                continue;
            }

            self.notify(&RequestEvent {
                path,
                status_code: status.as_u16(),
                request_count,
                response: None,
                rate_limited: false,
                rate_limit_wait: None,
            });
            return Err(Error::Api {
                status: status.as_u16(),
                message,
                payload,
            });
        }
    }
}

/// Cursor over the paginated photo list.
struct Pager {
    per_page: usize,
    max_pages: Option<usize>,
    max_items: Option<usize>,
    page: usize,
    emitted: usize,
    buffered: VecDeque<Value>,
    exhausted: bool,
}

impl Pager {
    fn new(options: PageOptions) -> Self {
        Self {
            per_page: options.per_page.clamp(1, MAX_PER_PAGE),
            max_pages: options.max_pages,
            max_items: options.max_items,
            page: 1,
            emitted: 0,
            buffered: VecDeque::new(),
            exhausted: false,
        }
    }

    async fn next_photo(&mut self, client: &UnsplashClient, username: &str) -> Result<Option<Value>> {
        loop {
            if self.max_items.is_some_and(|max| self.emitted >= max) {
                return Ok(None);
            }
            if let Some(photo) = self.buffered.pop_front() {
                self.emitted += 1;
                return Ok(Some(photo));
            }
            if self.exhausted || self.max_pages.is_some_and(|max| self.page > max) {
                return Ok(None);
            }

            let photos = match client.photos_page(username, self.page, self.per_page).await? {
                Value::Array(photos) if !photos.is_empty() => photos,
                _ => {
                    self.exhausted = true;
                    return Ok(None);
                }
            };
            if photos.len() < self.per_page {
                self.exhausted = true;
            }
            self.page += 1;
            self.buffered.extend(photos);
        }
    }
}
