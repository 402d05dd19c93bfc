use std::{convert::Infallible, future::Future, net::SocketAddr};

use anyhow::Result;
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use ms_store::BalanceProofStore;
use serde_json::json;

use crate::BalanceProofRecord;

pub const BALANCE_PROOFS_PATH: &str = "/api/1/balance_proofs";
pub const LEGACY_BALANCE_PROOFS_PATH: &str = "/balance_proofs";

/// Binds the read-only REST server.
///
/// Returns the bound address and the future serving requests until
/// `shutdown` resolves.
pub fn bind_rest_server<F>(
    listen_addr: &SocketAddr,
    store: BalanceProofStore,
    shutdown: F,
) -> Result<(SocketAddr, impl Future<Output = Result<()>>)>
where
    F: Future<Output = ()> + Send + 'static,
{
    let server = Server::try_bind(listen_addr)?.serve(make_service_fn(move |_| {
        let store = store.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| serve(store.clone(), req))) }
    }));
    let local_addr = server.local_addr();
    log::info!("REST server listening on http://{}", local_addr);

    let serving = async move {
        server.with_graceful_shutdown(shutdown).await?;
        log::info!("REST server stopped");
        Ok(())
    };
    Ok((local_addr, serving))
}

async fn serve(store: BalanceProofStore, req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::OPTIONS, _) => with_cors(Response::builder().status(StatusCode::NO_CONTENT))
            .body(Body::empty()),
        (&Method::GET, BALANCE_PROOFS_PATH | LEGACY_BALANCE_PROOFS_PATH) => balance_proofs(&store),
        (_, BALANCE_PROOFS_PATH | LEGACY_BALANCE_PROOFS_PATH) => {
            error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
        }
        _ => error_response(StatusCode::NOT_FOUND, "not found"),
    };
    Ok(response.unwrap_or_else(|err| {
        log::error!("REST server build response error: {}", err);
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    }))
}

fn balance_proofs(store: &BalanceProofStore) -> hyper::http::Result<Response<Body>> {
    let entries = match store.list() {
        Ok(entries) => entries,
        Err(err) => {
            log::error!("REST server list balance proofs error: {}", err);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "store unavailable");
        }
    };
    let records: Vec<BalanceProofRecord> = entries.iter().map(Into::into).collect();
    match serde_json::to_vec(&records) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => {
            log::error!("REST server encode balance proofs error: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "encode error")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> hyper::http::Result<Response<Body>> {
    let body = json!({ "error": message }).to_string();
    json_response(status, body.into_bytes())
}

fn json_response(status: StatusCode, body: Vec<u8>) -> hyper::http::Result<Response<Body>> {
    with_cors(Response::builder().status(status))
        .header("Content-Type", "application/json")
        .body(Body::from(body))
}

fn with_cors(builder: hyper::http::response::Builder) -> hyper::http::response::Builder {
    builder
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "*")
        .header("Access-Control-Allow-Headers", "*")
}
