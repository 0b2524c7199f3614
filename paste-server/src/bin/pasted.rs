//! `pasted`: the upload/retrieval server binary. Thin bootstrap only —
//! everything it does is delegate to `paste_server`'s library surface.
//! Modeled on `proxmox-restore-daemon/src/main.rs`'s shape for a small
//! standalone daemon: `clap` for arguments, `env_logger` for logging, one
//! `hyper::Server` bound to a configured address.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Error};
use clap::Parser;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use log::info;

use paste_api_types::Config;
use paste_datastore::ObjectStore;
use paste_server::session::{IdMode, SessionLimits};
use paste_server::{http, upgrade};

#[derive(Parser, Debug)]
#[command(name = "pasted", about = "Zero-knowledge encrypted blob exchange server")]
struct Args {
    /// Path to the server's TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Address to bind the HTTP/websocket listener on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load(&args.config).context("loading configuration")?;
    info!(
        "starting pasted: upload-dir={:?} max-blob-size={} chunk-size={}",
        config.upload_dir, config.max_blob_size, config.chunk_size
    );

    let store = Arc::new(ObjectStore::new(&config.upload_dir)?);
    let limits = SessionLimits {
        max_blob_size: config.max_blob_size,
        chunk_size: config.chunk_size,
        id_width: config.id_width,
    };

    let make_svc = make_service_fn(move |_conn| {
        let store = store.clone();
        let limits = limits.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                dispatch(store.clone(), limits.clone(), req)
            }))
        }
    });

    let server = Server::bind(&args.listen).serve(make_svc);
    info!("listening on {}", args.listen);
    server.await.context("server loop failed")
}

/// Route `GET /upload` (with a websocket upgrade) separately from the three
/// plain retrieval endpoints `http::handle` already covers.
async fn dispatch(
    store: Arc<ObjectStore>,
    limits: SessionLimits,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    if req.uri().path() == "/upload" {
        if !upgrade::is_upgrade_request(&req) {
            return Ok(bad_request("expected a websocket upgrade request"));
        }
        let id_mode = if req.uri().query().unwrap_or("").contains("mode=passphrase") {
            IdMode::ClientSupplied
        } else {
            IdMode::ServerGenerated
        };
        return match upgrade::accept_response(&req) {
            Ok(response) => {
                upgrade::spawn_session(req, store, limits, id_mode);
                Ok(response)
            }
            Err(err) => Ok(bad_request(&err.to_string())),
        };
    }

    Ok(http::handle(store, req).await)
}

fn bad_request(message: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(message.to_owned()));
    *response.status_mut() = hyper::StatusCode::BAD_REQUEST;
    response
}
