use crate::crypto::Crypto;
use crate::error::Error;
use crate::header::Header;
use crate::keys::{ChainKey, HeaderKey, MessageKey};
use crate::skipped_keys::SkippedKeysStorage;

/// Receiving half of the symmetric ratchet.
///
/// Owns the skipped-message-key store. Like the sending chain, it may
/// corrupt itself on failure; the session clones before mutating.
pub(crate) struct ReceivingChain {
    pub(crate) master_key: Option<ChainKey>,
    pub(crate) header_key: Option<HeaderKey>,
    pub(crate) next_header_key: HeaderKey,
    pub(crate) next_message_number: u64,
    pub(crate) skipped_keys: Box<dyn SkippedKeysStorage>,
}

impl Clone for ReceivingChain {
    fn clone(&self) -> Self {
        Self {
            master_key: self.master_key.clone(),
            header_key: self.header_key.clone(),
            next_header_key: self.next_header_key.clone(),
            next_message_number: self.next_message_number,
            skipped_keys: self.skipped_keys.clone_storage(),
        }
    }
}

impl ReceivingChain {
    pub(crate) fn new(
        next_header_key: HeaderKey,
        skipped_keys: Box<dyn SkippedKeysStorage>,
    ) -> Self {
        Self {
            master_key: None,
            header_key: None,
            next_header_key,
            next_message_number: 0,
            skipped_keys,
        }
    }

    /// Tries to decrypt the message with a previously skipped message key.
    ///
    /// Returns `Ok(None)` when no stored header key opens the header or the
    /// message number is not retained, leaving the chain untouched.
    pub(crate) fn try_skipped_keys(
        &mut self,
        crypto: &dyn Crypto,
        encrypted_header: &[u8],
        encrypted_data: &[u8],
        auth: &[u8],
    ) -> Result<Option<Vec<u8>>, Error> {
        let mut matched: Option<(HeaderKey, u64, MessageKey)> = None;

        for (header_key, bucket) in self.skipped_keys.iter() {
            let Ok(header) = crypto.decrypt_header(header_key, encrypted_header) else {
                continue;
            };

            for (message_number, message_key) in bucket {
                if message_number == header.message_number {
                    matched = Some((header_key.clone(), message_number, message_key.clone()));
                    break;
                }
            }

            if matched.is_some() {
                break;
            }
        }

        let Some((header_key, message_number, message_key)) = matched else {
            return Ok(None);
        };

        let auth = [encrypted_header, auth].concat();
        let data = crypto
            .decrypt_message(&message_key, encrypted_data, &auth)
            .map_err(|err| err.context_in_kind("decrypt message with skipped key"))?;

        self.skipped_keys
            .delete(&header_key, message_number)
            .map_err(|err| err.context_in_kind("delete used skipped key"))?;

        Ok(Some(data))
    }

    /// Decrypts the header with the current key, then with the next one.
    ///
    /// A match on the next header key means the sender has moved to a new
    /// epoch and a Diffie-Hellman ratchet step is due.
    pub(crate) fn match_header(
        &self,
        crypto: &dyn Crypto,
        encrypted_header: &[u8],
    ) -> Result<(Header, bool), Error> {
        if let Some(header_key) = &self.header_key {
            if let Ok(header) = crypto.decrypt_header(header_key, encrypted_header) {
                return Ok((header, false));
            }
        }

        if let Ok(header) = crypto.decrypt_header(&self.next_header_key, encrypted_header) {
            return Ok((header, true));
        }

        Err(Error::Crypto("header could not be decrypted".to_string()))
    }

    /// Advances the chain up to (not including) `until`, storing each
    /// produced message key under the current header key.
    pub(crate) fn skip_message_keys(
        &mut self,
        crypto: &dyn Crypto,
        until: u64,
    ) -> Result<(), Error> {
        while self.next_message_number < until {
            let message_number = self.next_message_number;
            let message_key = self
                .advance(crypto)
                .map_err(|err| err.context("advance chain"))?;

            let header_key = self.header_key.as_ref().ok_or_else(|| {
                Error::Invariant("skipping message keys without a header key".to_string())
            })?;

            self.skipped_keys
                .add(header_key, message_number, message_key)
                .map_err(|err| err.context_in_kind("add skipped key"))?;
        }

        Ok(())
    }

    /// Installs a fresh chain epoch after a Diffie-Hellman ratchet step.
    pub(crate) fn upgrade(&mut self, master_key: ChainKey, next_header_key: HeaderKey) {
        self.header_key = Some(std::mem::replace(&mut self.next_header_key, next_header_key));
        self.master_key = Some(master_key);
        self.next_message_number = 0;
    }

    pub(crate) fn advance(&mut self, crypto: &dyn Crypto) -> Result<MessageKey, Error> {
        let master_key = self
            .master_key
            .as_ref()
            .ok_or_else(|| Error::InvalidValue("master key is not set".to_string()))?;

        let (new_master_key, message_key) = crypto
            .advance_message_chain(master_key)
            .map_err(|err| err.context_in_kind("advance via crypto"))?;

        self.master_key = Some(new_master_key);
        self.next_message_number = self.next_message_number.wrapping_add(1);

        Ok(message_key)
    }
}
