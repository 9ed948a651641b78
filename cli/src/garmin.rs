use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{StatusCode, Url};

use weightsync_core::error::SourceError;
use weightsync_core::source::{MeasurementSource, RawMeasurement, WeightRangeResponse};

use crate::config::Credentials;
use crate::session::SavedSession;

const SSO_SIGNIN_URL: &str = "https://sso.garmin.com/sso/signin";
const SSO_HOST: &str = "https://sso.garmin.com/sso";
const CONNECT_URL: &str = "https://connect.garmin.com/modern";
const WEIGHT_RANGE_URL: &str =
    "https://connect.garmin.com/modern/proxy/weight-service/weight/dateRange";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// URLs the client talks to.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub sso_signin: String,
    pub sso_host: String,
    pub connect: String,
    pub weight_range: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            sso_signin: SSO_SIGNIN_URL.to_string(),
            sso_host: SSO_HOST.to_string(),
            connect: CONNECT_URL.to_string(),
            weight_range: WEIGHT_RANGE_URL.to_string(),
        }
    }
}

/// Garmin Connect weight-service client.
///
/// Signs in through the SSO form and keeps the session in a cookie jar, which
/// is saved to `session_path` after each sign-in and restored on start. A data
/// call that is rejected, or that lands on the sign-in page, triggers one
/// fresh sign-in.
pub struct GarminClient {
    client: reqwest::Client,
    jar: Arc<Jar>,
    rt: tokio::runtime::Handle,
    credentials: Credentials,
    endpoints: Endpoints,
    session_path: Option<PathBuf>,
    logged_in: bool,
}

impl GarminClient {
    pub fn new(
        credentials: Credentials,
        rt: tokio::runtime::Handle,
        session_path: Option<PathBuf>,
    ) -> Result<Self> {
        Self::with_endpoints(
            credentials,
            rt,
            session_path,
            Endpoints::default(),
            REQUEST_TIMEOUT,
        )
    }

    pub fn with_endpoints(
        credentials: Credentials,
        rt: tokio::runtime::Handle,
        session_path: Option<PathBuf>,
        endpoints: Endpoints,
        timeout: Duration,
    ) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .user_agent(format!("weightsync/{}", env!("CARGO_PKG_VERSION")))
            .cookie_provider(Arc::clone(&jar))
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .context("Failed to build HTTP client")?;
        let mut garmin = Self {
            client,
            jar,
            rt,
            credentials,
            endpoints,
            session_path,
            logged_in: false,
        };
        garmin.restore_session();
        Ok(garmin)
    }

    fn signin_params(&self) -> [(&str, &str); 5] {
        [
            ("service", self.endpoints.connect.as_str()),
            ("webhost", self.endpoints.connect.as_str()),
            ("gauthHost", self.endpoints.sso_host.as_str()),
            ("clientId", "GarminConnect"),
            ("embed", "false"),
        ]
    }

    pub async fn login_async(&self) -> Result<(), SourceError> {
        tracing::info!("signing in to Garmin Connect");

        let resp = self
            .client
            .get(&self.endpoints.sso_signin)
            .query(&self.signin_params())
            .send()
            .await
            .map_err(transport_error)?;
        check_status(resp.status())?;
        let page = resp.text().await.map_err(transport_error)?;
        let csrf = extract_csrf(&page).ok_or_else(|| {
            SourceError::RemoteService("sign-in page did not contain a CSRF token".to_string())
        })?;

        let resp = self
            .client
            .post(&self.endpoints.sso_signin)
            .query(&self.signin_params())
            .header(reqwest::header::REFERER, &self.endpoints.sso_signin)
            .form(&[
                ("username", self.credentials.email.as_str()),
                ("password", self.credentials.password()),
                ("embed", "false"),
                ("_csrf", csrf),
            ])
            .send()
            .await
            .map_err(transport_error)?;
        check_status(resp.status())?;
        let page = resp.text().await.map_err(transport_error)?;
        let ticket = extract_ticket(&page).ok_or_else(|| {
            SourceError::Authentication(
                "Garmin did not issue a service ticket; check GARMIN_EMAIL and GARMIN_PASSWORD"
                    .to_string(),
            )
        })?;

        let resp = self
            .client
            .get(&self.endpoints.connect)
            .query(&[("ticket", ticket)])
            .send()
            .await
            .map_err(transport_error)?;
        check_status(resp.status())?;

        tracing::info!("signed in to Garmin Connect");
        Ok(())
    }

    pub async fn fetch_range_async(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawMeasurement>, SourceError> {
        let resp = self
            .client
            .get(&self.endpoints.weight_range)
            .query(&[
                ("startDate", start.format("%Y-%m-%d").to_string()),
                ("endDate", end.format("%Y-%m-%d").to_string()),
            ])
            .header("NK", "NT")
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        // An expired session is sometimes redirected to the sign-in form
        // instead of being answered with 401.
        if resp.url().as_str().starts_with(&self.endpoints.sso_signin) {
            return Err(SourceError::Authentication(
                "Garmin session expired, redirected to sign-in".to_string(),
            ));
        }

        let status = resp.status();
        check_status(status)?;
        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        let body = resp.text().await.map_err(transport_error)?;
        parse_weight_range(&body)
    }

    fn ensure_logged_in(&mut self) -> Result<(), SourceError> {
        if !self.logged_in {
            self.rt.block_on(self.login_async())?;
            self.logged_in = true;
            self.save_session();
        }
        Ok(())
    }

    fn session_urls(&self) -> [&str; 2] {
        [
            self.endpoints.connect.as_str(),
            self.endpoints.sso_signin.as_str(),
        ]
    }

    fn restore_session(&mut self) {
        let Some(path) = &self.session_path else {
            return;
        };
        let saved = match SavedSession::load(path) {
            Ok(Some(saved)) if saved.usable_for(&self.credentials.email) => saved,
            Ok(_) => return,
            Err(e) => {
                tracing::warn!("ignoring saved Garmin session: {e:#}");
                return;
            }
        };
        for (url, header) in &saved.cookies {
            let Ok(url) = url.parse::<Url>() else {
                continue;
            };
            for pair in header.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                self.jar.add_cookie_str(pair, &url);
            }
        }
        tracing::info!(saved_at = %saved.saved_at, "reusing saved Garmin session");
        self.logged_in = true;
    }

    fn save_session(&self) {
        let Some(path) = &self.session_path else {
            return;
        };
        let cookies: BTreeMap<String, String> = self
            .session_urls()
            .iter()
            .filter_map(|u| {
                let header = self.jar.cookies(&u.parse::<Url>().ok()?)?;
                Some(((*u).to_string(), header.to_str().ok()?.to_string()))
            })
            .collect();
        let session = SavedSession {
            email: self.credentials.email.clone(),
            saved_at: Utc::now(),
            cookies,
        };
        match session.save(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "saved Garmin session"),
            Err(e) => tracing::warn!("could not save Garmin session: {e:#}"),
        }
    }
}

impl MeasurementSource for GarminClient {
    fn fetch_range(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawMeasurement>, SourceError> {
        let reused = self.logged_in;
        self.ensure_logged_in()?;
        match self.rt.block_on(self.fetch_range_async(start, end)) {
            Err(e) if session_stale(&e, reused) => {
                tracing::info!(reason = %e, "Garmin session not accepted, signing in again");
                self.logged_in = false;
                self.ensure_logged_in()?;
                self.rt.block_on(self.fetch_range_async(start, end))
            }
            other => other,
        }
    }
}

/// Whether a failed data call should be retried after a fresh sign-in.
/// A reused session that has gone stale can also come back as a page that is
/// not weight data.
fn session_stale(err: &SourceError, reused: bool) -> bool {
    match err {
        SourceError::Authentication(_) => true,
        SourceError::RemoteService(_) => reused,
        SourceError::TransientNetwork(_) => false,
    }
}

fn parse_weight_range(body: &str) -> Result<Vec<RawMeasurement>, SourceError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let data: WeightRangeResponse = serde_json::from_str(body).map_err(|e| {
        SourceError::RemoteService(format!("unexpected weight-service response: {e}"))
    })?;
    Ok(data.into_measurements())
}

/// Map a non-success HTTP status onto the error taxonomy.
fn check_status(status: StatusCode) -> Result<(), SourceError> {
    if status.is_success() || status.is_redirection() {
        return Ok(());
    }
    Err(match status.as_u16() {
        401 | 403 => SourceError::Authentication(format!("Garmin answered {status}")),
        408 | 429 | 500..=599 => SourceError::TransientNetwork(format!("Garmin answered {status}")),
        _ => SourceError::RemoteService(format!("Garmin answered {status}")),
    })
}

fn transport_error(e: reqwest::Error) -> SourceError {
    if e.is_decode() {
        SourceError::RemoteService(e.to_string())
    } else {
        // Timeouts, refused connections, resets and truncated bodies
        SourceError::TransientNetwork(e.to_string())
    }
}

fn extract_csrf(page: &str) -> Option<&str> {
    let at = page.find(r#"name="_csrf""#)?;
    let rest = &page[at..];
    let value = rest.find(r#"value=""#)? + r#"value=""#.len();
    let rest = &rest[value..];
    let end = rest.find('"')?;
    Some(&rest[..end]).filter(|v| !v.is_empty())
}

fn extract_ticket(page: &str) -> Option<&str> {
    let at = page.find("ticket=")? + "ticket=".len();
    let rest = &page[at..];
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(rest.len());
    Some(&rest[..end]).filter(|t| t.starts_with("ST-"))
}
