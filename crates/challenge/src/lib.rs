pub mod challenger;
pub mod validator;

pub use challenger::{Challenger, LogChallenger, OnchainChallenger};
pub use validator::{ChannelClose, CloseValidator, NonceValidator, StaticValidator, Verdict};
