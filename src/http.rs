//! HTTP API for project records and the beneficiary registers
//!
//! Public reads:
//! - `GET /api/health`
//! - `GET /api/projects/search?q=&year=` - up to 10 projects by relevance
//! - `GET /api/projects/years` - distinct financial years
//! - `GET /api/projects/stats` - totals and breakdowns
//! - `GET /api/projects/list?page=&limit=&search=&year=` - paginated listing
//! - `GET /api/projects/{key}` - one project by id or project code
//! - `GET /api/projects/{key}/progress` - progress history, oldest first
//! - `GET /api/{register}/search|years|stats|list` - as above, per register
//! - `GET /api/{register}/{id}` - one beneficiary by numeric id
//!
//! `{key}` is percent-decoded before lookup. `{register}` is `scholarship`
//! or `humanitarian`.
//!
//! Admin writes (`Authorization: Bearer <jwt>`):
//! - `POST /api/projects`
//! - `PUT /api/projects/{key}` (also `/{key}/update`)
//! - `DELETE /api/projects/{key}` (also `/{key}/delete`)
//! - `POST /api/projects/{key}/progress`
//! - `POST /api/{register}/create`
//! - `PUT /api/{register}/{id}` (also `/{id}/update`)
//! - `DELETE /api/{register}/{id}` (also `/{id}/delete`)
//!
//! ```bash
//! curl -X POST -H "Authorization: Bearer $TOKEN" \
//!      -d '{"current_status": "কাজ চলমান", "released_amount": 500000}' \
//!      http://localhost:3000/api/projects/ZP-2024-017/progress
//! ```

use crate::auth::{JwtValidator, Principal};
use crate::db::{self, now_timestamp};
use crate::error::RecordsError;
use crate::services::{self, BeneficiaryService, HandlerResult, Services};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

const PROJECTS_PREFIX: &str = "/api/projects/";
const SCHOLARSHIP_PREFIX: &str = "/api/scholarship/";
const HUMANITARIAN_PREFIX: &str = "/api/humanitarian/";

/// Query parameters of the search endpoint
#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    year: Option<String>,
}

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    jwt: Arc<JwtValidator>,
    bind_addr: SocketAddr,
    /// Hide internal error details from clients
    production: bool,
}

impl HttpServer {
    pub fn new(services: Arc<Services>, jwt: Arc<JwtValidator>, bind_addr: SocketAddr) -> Self {
        Self {
            services,
            jwt,
            bind_addr,
            production: false,
        }
    }

    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    /// Bind the configured address and serve forever
    pub async fn run(self: Arc<Self>) -> Result<(), RecordsError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), RecordsError> {
        info!(addr = %listener.local_addr()?, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new()
                    .serve_connection(io, service)
                    .await
                {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    async fn handle_request(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req.uri().query().map(str::to_string);
        let auth_header = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        debug!(method = %method, path = %path, "Incoming request");

        let body = match req.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                let err = RecordsError::Internal(format!("Failed to read body: {}", e));
                return Ok(services::error_response(err, !self.production));
            }
        };

        Ok(self.dispatch(&method, &path, query.as_deref(), auth_header.as_deref(), &body))
    }

    /// Route one request. Errors are rendered into the response.
    pub fn dispatch(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        auth_header: Option<&str>,
        body: &[u8],
    ) -> Response<Full<Bytes>> {
        match self.route(method, path, query, auth_header, body) {
            Ok(response) => response,
            Err(err) => {
                debug!(method = %method, path = %path, error = %err, "Request failed");
                services::error_response(err, !self.production)
            }
        }
    }

    fn route(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        auth_header: Option<&str>,
        body: &[u8],
    ) -> HandlerResult {
        let path = match path.trim_end_matches('/') {
            "" => "/",
            p => p,
        };

        match (method, path) {
            (&Method::GET, "/api/health") => self.handle_health(),

            (&Method::GET, "/api/projects/search") => self.handle_search(query),
            (&Method::GET, "/api/projects/years") => Ok(services::ok(&self.services.projects.years()?)),
            (&Method::GET, "/api/projects/stats") => Ok(services::ok(&self.services.projects.stats()?)),
            (&Method::GET, "/api/projects/list") => {
                let params: db::ListQuery = parse_query(query)?;
                Ok(services::ok(&self.services.projects.list(&params)?))
            }

            (&Method::POST, "/api/projects") => {
                let principal = self.jwt.authorize_admin(auth_header)?;
                self.handle_create(&principal, body)
            }

            (_, p) if p.starts_with(SCHOLARSHIP_PREFIX) => self.route_register(
                self.services.scholarships.as_ref(),
                method,
                &p[SCHOLARSHIP_PREFIX.len()..],
                query,
                auth_header,
                body,
            ),
            (_, p) if p.starts_with(HUMANITARIAN_PREFIX) => self.route_register(
                self.services.humanitarian.as_ref(),
                method,
                &p[HUMANITARIAN_PREFIX.len()..],
                query,
                auth_header,
                body,
            ),

            (_, p) if p.starts_with(PROJECTS_PREFIX) => {
                let rest = &p[PROJECTS_PREFIX.len()..];
                let (raw_key, action) = match rest.split_once('/') {
                    Some((key, action)) => (key, Some(action)),
                    None => (rest, None),
                };

                match (method, action) {
                    (&Method::GET, None) => {
                        let key = project_key(raw_key)?;
                        let project = self
                            .services
                            .projects
                            .get(&key)?
                            .ok_or_else(|| RecordsError::NotFound("Project not found".into()))?;
                        Ok(services::ok(&project))
                    }
                    (&Method::GET, Some("progress")) => {
                        let key = project_key(raw_key)?;
                        Ok(services::ok(&self.services.projects.progress_log(&key)?))
                    }
                    (&Method::PUT, None) | (&Method::PUT, Some("update")) => {
                        let principal = self.jwt.authorize_admin(auth_header)?;
                        self.handle_update(&principal, raw_key, body)
                    }
                    (&Method::DELETE, None) | (&Method::DELETE, Some("delete")) => {
                        let principal = self.jwt.authorize_admin(auth_header)?;
                        let key = project_key(raw_key)?;
                        self.services.projects.delete(&key)?;
                        info!(key = %key, user = principal.id, "Project deleted");
                        Ok(services::message("Project deleted successfully"))
                    }
                    (&Method::POST, Some("progress")) => {
                        let principal = self.jwt.authorize_admin(auth_header)?;
                        self.handle_record_progress(&principal, raw_key, body)
                    }
                    _ => Ok(services::not_found("Endpoint not found")),
                }
            }

            _ => Ok(services::not_found("Endpoint not found")),
        }
    }

    /// Routes below `/api/{register}/`
    fn route_register<S: BeneficiaryService>(
        &self,
        service: &S,
        method: &Method,
        rest: &str,
        query: Option<&str>,
        auth_header: Option<&str>,
        body: &[u8],
    ) -> HandlerResult {
        match (method, rest) {
            (&Method::GET, "search") => {
                let params: SearchParams = parse_query(query)?;
                let results = service.search(params.q.as_deref().unwrap_or(""), params.year.as_deref())?;
                Ok(services::ok(&results))
            }
            (&Method::GET, "years") => Ok(services::ok(&service.years()?)),
            (&Method::GET, "stats") => Ok(services::ok(&service.stats()?)),
            (&Method::GET, "list") => {
                let params: db::ListQuery = parse_query(query)?;
                Ok(services::ok(&service.list(&params)?))
            }
            (&Method::POST, "create") => {
                let principal = self.jwt.authorize_admin(auth_header)?;
                let input: S::Input = parse_body(body)?;
                let id = service.create(&input, &principal)?;
                Ok(services::created(&serde_json::json!({
                    "id": id,
                    "message": "Record created successfully",
                })))
            }
            _ => {
                let (raw_id, action) = match rest.split_once('/') {
                    Some((id, action)) => (id, Some(action)),
                    None => (rest, None),
                };

                match (method, action) {
                    (&Method::GET, None) => Ok(services::ok(&service.get(record_id(raw_id)?)?)),
                    (&Method::PUT, None) | (&Method::PUT, Some("update")) => {
                        let principal = self.jwt.authorize_admin(auth_header)?;
                        let id = record_id(raw_id)?;
                        let input: S::Input = parse_body(body)?;
                        service.update(id, &input)?;
                        debug!(id, user = principal.id, "Record updated");
                        Ok(services::message("Record updated successfully"))
                    }
                    (&Method::DELETE, None) | (&Method::DELETE, Some("delete")) => {
                        let principal = self.jwt.authorize_admin(auth_header)?;
                        let id = record_id(raw_id)?;
                        service.delete(id)?;
                        info!(id, user = principal.id, "Record deleted");
                        Ok(services::message("Record deleted successfully"))
                    }
                    _ => Ok(services::not_found("Endpoint not found")),
                }
            }
        }
    }

    /// GET /api/health
    fn handle_health(&self) -> HandlerResult {
        let stats = self.services.db().stats()?;
        Ok(services::ok(&serde_json::json!({
            "status": "ok",
            "message": "Project records API is running",
            "timestamp": now_timestamp(),
            "projects": stats.project_count,
            "progress_entries": stats.progress_log_count,
        })))
    }

    /// GET /api/projects/search
    fn handle_search(&self, query: Option<&str>) -> HandlerResult {
        let params: SearchParams = parse_query(query)?;
        let results = self.services.projects.search(
            params.q.as_deref().unwrap_or(""),
            params.year.as_deref(),
        )?;
        Ok(services::ok(&results))
    }

    /// POST /api/projects
    fn handle_create(&self, principal: &Principal, body: &[u8]) -> HandlerResult {
        let input: db::CreateProjectInput = parse_body(body)?;
        let id = self.services.projects.create(&input, principal)?;
        Ok(services::created(&serde_json::json!({
            "id": id,
            "message": "Project created successfully",
        })))
    }

    /// PUT /api/projects/{key}
    fn handle_update(&self, principal: &Principal, raw_key: &str, body: &[u8]) -> HandlerResult {
        let key = project_key(raw_key)?;
        let input: db::UpdateProjectInput = parse_body(body)?;
        self.services.projects.update(&key, &input)?;
        debug!(key = %key, user = principal.id, "Project updated");
        Ok(services::message("Project updated successfully"))
    }

    /// POST /api/projects/{key}/progress
    fn handle_record_progress(
        &self,
        principal: &Principal,
        raw_key: &str,
        body: &[u8],
    ) -> HandlerResult {
        let key = project_key(raw_key)?;
        let submission: db::ProgressSubmission = parse_body(body)?;
        let pct = self.services.projects.record_progress(&key, &submission, principal)?;
        Ok(services::ok(&serde_json::json!({
            "message": "Progress recorded successfully",
            "progress_percentage": pct,
        })))
    }
}

/// Percent-decode a project key path segment and parse it
fn project_key(raw: &str) -> Result<db::ProjectKey, RecordsError> {
    let decoded = urlencoding::decode(raw)
        .map_err(|_| RecordsError::InvalidInput("Invalid project ID".into()))?;
    db::ProjectKey::parse(&decoded)
}

/// Beneficiary ids are positive integers
fn record_id(raw: &str) -> Result<i64, RecordsError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| RecordsError::InvalidInput("Invalid beneficiary ID".into()))
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, RecordsError> {
    if body.is_empty() {
        return Err(RecordsError::InvalidInput("Request body is required".into()));
    }
    Ok(serde_json::from_slice(body)?)
}

fn parse_query<T: DeserializeOwned + Default>(query: Option<&str>) -> Result<T, RecordsError> {
    match query {
        None | Some("") => Ok(T::default()),
        Some(q) => serde_urlencoded::from_str(q)
            .map_err(|e| RecordsError::InvalidInput(format!("Invalid query string: {}", e))),
    }
}
