use std::sync::Arc;

use crate::crypto::{Crypto, DefaultCrypto};
use crate::skipped_keys::{InMemorySkippedKeys, SkippedKeysStorage};

/// Configuration applied at session construction.
pub enum SessionOption {
    /// Substitute the cryptographic primitive provider.
    Crypto(Arc<dyn Crypto>),
    /// Substitute the skipped-message-keys storage.
    SkippedKeysStorage(Box<dyn SkippedKeysStorage>),
}

pub(crate) struct SessionConfig {
    pub(crate) crypto: Arc<dyn Crypto>,
    pub(crate) skipped_keys: Box<dyn SkippedKeysStorage>,
}

impl SessionConfig {
    pub(crate) fn new(options: impl IntoIterator<Item = SessionOption>) -> Self {
        let mut config = Self {
            crypto: Arc::new(DefaultCrypto),
            skipped_keys: Box::new(InMemorySkippedKeys::new()),
        };

        for option in options {
            match option {
                SessionOption::Crypto(crypto) => config.crypto = crypto,
                SessionOption::SkippedKeysStorage(storage) => config.skipped_keys = storage,
            }
        }

        config
    }
}
