use crate::config::Config;
use crate::error::{Result, ScraperError};
use crate::models::DelayConfig;
use async_trait::async_trait;
use rand::Rng;
use reqwest::Url;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// The per-course LMS pages the aggregator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    /// Course front page listing weekly sections and their video activities.
    VodIndex,
    /// Online attendance report.
    VodAttendance,
    /// Assignment index.
    Assignments,
    /// Quiz index.
    Quizzes,
}

impl Page {
    pub const ALL: [Page; 4] = [
        Page::VodIndex,
        Page::VodAttendance,
        Page::Assignments,
        Page::Quizzes,
    ];

    /// Path and query of the page for a course, relative to the LMS origin.
    pub fn path(&self, course_id: &str) -> String {
        let path = match self {
            Page::VodIndex => "/course/view.php",
            Page::VodAttendance => "/report/ubcompletion/user_progress_a.php",
            Page::Assignments => "/mod/assign/index.php",
            Page::Quizzes => "/mod/quiz/index.php",
        };
        format!("{}?id={}", path, course_id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Page::VodIndex => "vod-index",
            Page::VodAttendance => "vod-attendance",
            Page::Assignments => "assignments",
            Page::Quizzes => "quizzes",
        }
    }
}

/// Where LMS pages come from. [`LmsClient`] implements it over HTTP; tests
/// implement it over fixtures.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// The LMS origin every page URL is built from.
    fn base_url(&self) -> &Url;

    /// Raw HTML of one course page.
    async fn fetch_page(&self, page: Page, course_id: &str) -> Result<String>;

    /// Raw HTML of the dashboard that lists the enrolled courses.
    async fn fetch_dashboard(&self) -> Result<String>;

    /// Absolute URL of one course page.
    fn page_url(&self, page: Page, course_id: &str) -> Result<Url> {
        join_url(self.base_url(), &page.path(course_id))
    }
}

/// HTTP client that reads LMS pages with the user's session cookies.
pub struct LmsClient {
    client: reqwest::Client,
    base_url: Url,
    cookie_jar: Arc<Jar>,
    delay: DelayConfig,
}

impl LmsClient {
    /// Client for the LMS at `base_url` with no delay and no timeout.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_options(base_url, DelayConfig::default(), None)
    }

    pub fn with_options(
        base_url: &str,
        delay: DelayConfig,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ScraperError::ConfigError(format!("invalid LMS base URL: {}", e)))?;
        let cookie_jar = Arc::new(Jar::default());

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

        let mut builder = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&cookie_jar))
            .default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            cookie_jar,
            delay,
        })
    }

    /// Builds a client from configuration, seeding the session cookie when
    /// one is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Self::with_options(
            config.base_url.as_str(),
            config.delay.clone(),
            config.request_timeout,
        )?;
        Ok(match &config.session_cookie {
            Some(cookie) => client.with_session_cookie(cookie),
            None => client,
        })
    }

    /// Adds the cookies of a `Cookie` header value (`a=1; b=2`) to the jar for
    /// the LMS origin, so requests carry the user's existing session.
    pub fn with_session_cookie(self, cookie_header: &str) -> Self {
        for pair in cookie_header.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            self.cookie_jar.add_cookie_str(pair, &self.base_url);
        }
        self
    }

    /// GETs any LMS URL and returns its body.
    ///
    /// Non-success statuses fail with [`ScraperError::HttpStatus`], and a
    /// redirect to the login page fails with [`ScraperError::SessionExpired`].
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let url = join_url(&self.base_url, url)?;
        self.get_html(url).await
    }

    async fn get_html(&self, url: Url) -> Result<String> {
        self.human_delay().await;
        debug!(%url, "GET");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }
        if response.url().path().starts_with("/login") {
            return Err(ScraperError::SessionExpired);
        }

        Ok(response.text().await?)
    }

    async fn human_delay(&self) {
        if !self.delay.enabled {
            return;
        }
        let low = self.delay.min_delay_ms.min(self.delay.max_delay_ms);
        let high = self.delay.min_delay_ms.max(self.delay.max_delay_ms);
        let wait = rand::rng().random_range(low..=high);
        if wait > 0 {
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }
    }
}

#[async_trait]
impl PageSource for LmsClient {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn fetch_page(&self, page: Page, course_id: &str) -> Result<String> {
        let url = self.page_url(page, course_id)?;
        self.get_html(url).await
    }

    async fn fetch_dashboard(&self) -> Result<String> {
        self.get_html(self.base_url.clone()).await
    }
}

fn join_url(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| ScraperError::ConfigError(format!("cannot build URL from `{}`: {}", path, e)))
}
