//! Actix Web service persisting the entry list and answering hub/probe queries.
//!
//! Routes:
//! - `GET  /addresses` whole list, re-read from the data file
//! - `POST /addresses` replace the whole list
//! - `GET  /hubs?threshold=&radius_override=` hubs for the current list
//! - `GET  /aggregate?lat=&lng=` total count covering a position
//!
//! The server can run on the calling thread ([`run`]) or on a dedicated one
//! ([`spawn`]), which keeps the Actix runtime away from blocking callers.

use std::net::SocketAddr;
use std::sync::{mpsc, Mutex, MutexGuard};

use actix_web::{
    dev::{Server, ServerHandle},
    http::Method,
    middleware, web, App, HttpResponse, HttpServer,
};
use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{MapperConfig, ServerConfig};
use crate::core::entry::{is_valid_radius, LocatedEntry};
use crate::core::geo::Position;
use crate::processors::clustering::{compute_hubs, HubCluster};
use crate::processors::radius::{apply_radius_override, parse_radius_override};
use crate::session::MapSession;
use crate::storage::{EntryRepository, JsonFileRepository};

/// Shared state backing HTTP handlers.
pub struct AppState {
    session: Mutex<MapSession>,
    repo: JsonFileRepository,
    /// Radius used by `/hubs` when the query names none; never stored.
    default_radius_override: Option<f64>,
}

impl AppState {
    /// Open the data file, creating it if needed, and load the session.
    ///
    /// Failures are logged and leave the session empty.
    pub fn open(config: &MapperConfig) -> Self {
        let repo = JsonFileRepository::new(config.storage.data_file.clone());
        if let Err(e) = repo.ensure_exists() {
            error!("could not create {}: {}", repo.path().display(), e);
        }
        let entries = repo.load().unwrap_or_else(|e| {
            warn!("starting with an empty list: {}", e);
            Vec::new()
        });
        info!("loaded {} entries from {}", entries.len(), repo.path().display());

        Self {
            session: Mutex::new(MapSession::with_entries(entries, &config.hubs)),
            repo,
            default_radius_override: config.hubs.radius_override.filter(|r| is_valid_radius(*r)),
        }
    }

    fn session(&self) -> MutexGuard<'_, MapSession> {
        // A panic in another handler must not take the list down with it.
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Register all routes on an app or scope.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/addresses", web::get().to(get_addresses))
        .route("/addresses", web::post().to(save_addresses))
        .route("/addresses", web::method(Method::OPTIONS).to(preflight))
        .route("/hubs", web::get().to(get_hubs))
        .route("/aggregate", web::get().to(get_aggregate));
}

fn cors_headers() -> middleware::DefaultHeaders {
    middleware::DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Methods", "GET, POST, OPTIONS"))
        .add(("Access-Control-Allow-Headers", "Content-Type"))
}

fn message(text: &str) -> serde_json::Value {
    json!({ "message": text })
}

async fn preflight() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

/// Re-read the data file; on failure fall back to the in-memory list.
async fn get_addresses(state: web::Data<AppState>) -> HttpResponse {
    let loaded = state.repo.load();
    let mut session = state.session();
    match loaded {
        Ok(entries) => {
            session.replace_all(entries);
        }
        Err(e) => error!("Error reading data file: {}", e),
    }
    HttpResponse::Ok().json(session.entries())
}

async fn save_addresses(
    state: web::Data<AppState>,
    body: web::Json<Vec<LocatedEntry>>,
) -> HttpResponse {
    let entries = body.into_inner();
    // Lock held across the file write and the session swap.
    let mut session = state.session();
    if let Err(e) = state.repo.save(&entries) {
        error!("Error writing data file: {}", e);
        return HttpResponse::InternalServerError().json(message("Failed to save data"));
    }
    let count = entries.len();
    session.replace_all(entries);
    info!("saved {} entries", count);
    HttpResponse::Ok().json(message("Data saved successfully"))
}

#[derive(Deserialize)]
struct HubsQuery {
    threshold: Option<String>,
    radius_override: Option<String>,
}

#[derive(Serialize)]
struct HubsResponse {
    threshold: Option<f64>,
    radius_override: Option<f64>,
    hubs: Vec<HubCluster>,
}

/// Hubs for the current list.
///
/// An absent `threshold` uses the configured one; a present but blank or
/// non-numeric one disables clustering. `radius_override` (or the configured
/// default) applies to this query only and is never persisted.
async fn get_hubs(state: web::Data<AppState>, query: web::Query<HubsQuery>) -> HttpResponse {
    let session = state.session();
    let threshold = match &query.threshold {
        None => session.threshold(),
        Some(raw) => raw.trim().parse::<f64>().ok(),
    };
    let radius_override = match &query.radius_override {
        None => state.default_radius_override,
        Some(raw) => match parse_radius_override(raw) {
            Some(r) => Some(r),
            None => {
                return HttpResponse::BadRequest().json(message("radius_override must be a non-negative number"))
            }
        },
    };

    let hubs = match radius_override {
        None if threshold == session.threshold() => session.hubs().to_vec(),
        None => compute_hubs(session.entries(), threshold),
        Some(radius) => {
            let mut entries = session.entries().to_vec();
            apply_radius_override(&mut entries, radius);
            compute_hubs(&entries, threshold)
        }
    };

    HttpResponse::Ok().json(HubsResponse {
        threshold,
        radius_override,
        hubs,
    })
}

#[derive(Deserialize)]
struct AggregateQuery {
    lat: f64,
    lng: f64,
}

async fn get_aggregate(state: web::Data<AppState>, query: web::Query<AggregateQuery>) -> HttpResponse {
    let Some(position) = Position::checked(query.lat, query.lng) else {
        return HttpResponse::BadRequest().json(message("lat/lng out of range"));
    };
    HttpResponse::Ok().json(state.session().probe(position))
}

fn bind(state: web::Data<AppState>, config: &ServerConfig) -> std::io::Result<(Server, Vec<SocketAddr>)> {
    let limit = config.payload_limit_bytes;
    let http = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(limit))
            .wrap(cors_headers())
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind((config.host.as_str(), config.port))?;
    let addrs = http.addrs();
    Ok((http.run(), addrs))
}

/// Run the service on the current thread until it is shut down.
pub fn run(config: &MapperConfig) -> Result<()> {
    let state = web::Data::new(AppState::open(config));
    let server_config = config.server.clone();
    actix_web::rt::System::new()
        .block_on(async move {
            let (server, addrs) = bind(state, &server_config)?;
            for addr in &addrs {
                info!("Server running on http://{}", addr);
            }
            server.await
        })
        .context("HTTP server failed")
}

/// Handle for a service running on its own thread.
pub struct RunningServer {
    addr: SocketAddr,
    handle: ServerHandle,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl RunningServer {
    /// First bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://host:port` for the first bound address.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the server gracefully and wait for its thread to exit.
    pub fn stop(mut self) {
        actix_web::rt::System::new().block_on(self.handle.stop(true));
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Spawn the service on a dedicated thread and wait until it is bound.
pub fn spawn(config: &MapperConfig) -> Result<RunningServer> {
    let state = web::Data::new(AppState::open(config));
    let server_config = config.server.clone();
    let (ready_tx, ready_rx) = mpsc::channel::<std::io::Result<(ServerHandle, SocketAddr)>>();

    let thread = std::thread::Builder::new()
        .name("hub-mapper-http".into())
        .spawn(move || {
            let result = actix_web::rt::System::new().block_on(async move {
                let (server, addrs) = match bind(state, &server_config) {
                    Ok(bound) => bound,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return Ok(());
                    }
                };
                let Some(addr) = addrs.first().copied() else {
                    let _ = ready_tx.send(Err(std::io::Error::other("server bound no address")));
                    return Ok(());
                };
                let _ = ready_tx.send(Ok((server.handle(), addr)));
                server.await
            });
            if let Err(err) = result {
                error!("HTTP server error: {err}");
            }
        })
        .context("Failed to spawn HTTP server thread")?;

    let (handle, addr) = ready_rx
        .recv()
        .map_err(|_| anyhow!("HTTP server thread exited before binding"))?
        .context("Failed to bind HTTP server")?;
    info!("Server running on http://{}", addr);

    Ok(RunningServer {
        addr,
        handle,
        thread: Some(thread),
    })
}
