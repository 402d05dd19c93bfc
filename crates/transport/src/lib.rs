mod auth;
mod error;
mod local;
mod tcp;
mod traits;

pub use auth::verify_message;
pub use error::TransportError;
pub use local::LocalTransport;
pub use tcp::TcpTransport;
pub use traits::{MessageCallback, Transport, TransportIdentity};
