use thiserror::Error;

// NOTE: only for failures of the request itself, a response that does not
// decode is a hard error
#[derive(Error, Debug)]
#[error("{client} error, method: {method} error: {source}")]
pub struct RPCRequestError {
    pub client: &'static str,
    pub method: String,
    pub source: anyhow::Error,
}

impl RPCRequestError {
    pub fn new<E: Into<anyhow::Error>>(client: &'static str, method: String, source: E) -> Self {
        RPCRequestError {
            client,
            method,
            source: source.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("abi error {0}")]
    Abi(#[from] ethabi::Error),
    #[error("missing event param {0}")]
    MissingParam(&'static str),
    #[error("value of {0} overflows")]
    Overflow(&'static str),
}

pub fn is_rpc_request_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<RPCRequestError>().is_some()
}
