//! Double Ratchet secure-messaging core: a cryptographic state machine
//! turning a pre-shared secret into an unbounded sequence of authenticated,
//! forward-secret, post-compromise-secure message encryptions.

mod config;
pub use config::SessionOption;

mod crypto;
pub use crypto::{Crypto, DefaultCrypto};

mod error;
pub use error::{Error, ErrorKind};

mod header;
pub use header::Header;

mod keys;
pub use keys::*;

mod message;
pub use message::Message;

mod receiving;
mod sending;

mod session;
pub use session::Session;

mod skipped_keys;
pub use skipped_keys::{
    InMemorySkippedKeys, MessageNumberKeysIter, SkippedKeysIter, SkippedKeysStorage,
    HEADER_KEYS_BEFORE_CLEAR, MESSAGE_KEYS_PER_HEADER_LIMIT,
};
