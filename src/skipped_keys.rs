use std::collections::HashMap;

use crate::error::Error;
use crate::keys::{HeaderKey, MessageKey};

/// Default cap on message keys retained per header key.
pub const MESSAGE_KEYS_PER_HEADER_LIMIT: usize = 1024;

/// Default number of header-key buckets at which the whole store is cleared.
pub const HEADER_KEYS_BEFORE_CLEAR: usize = 4;

pub type MessageNumberKeysIter<'a> = Box<dyn Iterator<Item = (u64, &'a MessageKey)> + 'a>;
pub type SkippedKeysIter<'a> = Box<dyn Iterator<Item = (&'a HeaderKey, MessageNumberKeysIter<'a>)> + 'a>;

/// Storage for message keys of messages that were skipped over.
///
/// Substitute the default through
/// [`SessionOption::SkippedKeysStorage`](crate::SessionOption::SkippedKeysStorage).
pub trait SkippedKeysStorage: Send + Sync {
    /// Adds a skipped message key under its header key.
    fn add(
        &mut self,
        header_key: &HeaderKey,
        message_number: u64,
        message_key: MessageKey,
    ) -> Result<(), Error>;

    /// Deletes a skipped message key by header key and message number.
    fn delete(&mut self, header_key: &HeaderKey, message_number: u64) -> Result<(), Error>;

    /// Lazily iterates over all skipped keys, bucketed by header key.
    ///
    /// Iteration order is unspecified; stop early by dropping the iterators.
    fn iter(&self) -> SkippedKeysIter<'_>;

    /// Deep copy sharing no mutable state with `self`.
    fn clone_storage(&self) -> Box<dyn SkippedKeysStorage>;
}

/// Bounded in-memory double map, the default [`SkippedKeysStorage`].
#[derive(Clone, Debug)]
pub struct InMemorySkippedKeys {
    keys: HashMap<HeaderKey, HashMap<u64, MessageKey>>,
    message_keys_limit: usize,
    header_keys_to_clear: usize,
}

impl Default for InMemorySkippedKeys {
    fn default() -> Self {
        Self {
            keys: HashMap::new(),
            message_keys_limit: MESSAGE_KEYS_PER_HEADER_LIMIT,
            header_keys_to_clear: HEADER_KEYS_BEFORE_CLEAR,
        }
    }
}

impl InMemorySkippedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with explicit bounds; both must be non-zero.
    pub fn with_limits(
        message_keys_limit: usize,
        header_keys_to_clear: usize,
    ) -> Result<Self, Error> {
        if message_keys_limit == 0 {
            return Err(Error::Option(Box::new(Error::InvalidValue(
                "message keys limit is zero".to_string(),
            ))));
        }

        if header_keys_to_clear == 0 {
            return Err(Error::Option(Box::new(Error::InvalidValue(
                "header keys to clear is zero".to_string(),
            ))));
        }

        Ok(Self {
            keys: HashMap::new(),
            message_keys_limit,
            header_keys_to_clear,
        })
    }
}

impl SkippedKeysStorage for InMemorySkippedKeys {
    fn add(
        &mut self,
        header_key: &HeaderKey,
        message_number: u64,
        message_key: MessageKey,
    ) -> Result<(), Error> {
        if self.keys.len() >= self.header_keys_to_clear {
            self.keys.clear();
        }

        if let Some(bucket) = self.keys.get(header_key) {
            if bucket.len() >= self.message_keys_limit {
                return Err(Error::Storage(format!(
                    "too many message keys: {} >= {}",
                    bucket.len(),
                    self.message_keys_limit
                )));
            }
        }

        self.keys
            .entry(header_key.clone())
            .or_default()
            .insert(message_number, message_key);

        Ok(())
    }

    fn delete(&mut self, header_key: &HeaderKey, message_number: u64) -> Result<(), Error> {
        if let Some(bucket) = self.keys.get_mut(header_key) {
            bucket.remove(&message_number);
        }

        Ok(())
    }

    fn iter(&self) -> SkippedKeysIter<'_> {
        Box::new(self.keys.iter().map(|(header_key, bucket)| {
            let bucket_iter: MessageNumberKeysIter<'_> =
                Box::new(bucket.iter().map(|(number, key)| (*number, key)));

            (header_key, bucket_iter)
        }))
    }

    fn clone_storage(&self) -> Box<dyn SkippedKeysStorage> {
        Box::new(self.clone())
    }
}
