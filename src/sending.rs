use crate::crypto::Crypto;
use crate::error::Error;
use crate::header::Header;
use crate::keys::{ChainKey, HeaderKey, MessageKey, PublicKey};

/// Sending half of the symmetric ratchet.
///
/// Operations may leave the chain corrupt when they fail partway, so the
/// session always works on a clone and swaps it in only on success.
#[derive(Clone, Default)]
pub(crate) struct SendingChain {
    pub(crate) master_key: Option<ChainKey>,
    pub(crate) header_key: Option<HeaderKey>,
    pub(crate) next_header_key: HeaderKey,
    pub(crate) next_message_number: u64,
    pub(crate) previous_chain_messages_count: u64,
}

impl SendingChain {
    pub(crate) fn new(
        master_key: Option<ChainKey>,
        header_key: Option<HeaderKey>,
        next_header_key: HeaderKey,
        next_message_number: u64,
        previous_chain_messages_count: u64,
    ) -> Self {
        Self {
            master_key,
            header_key,
            next_header_key,
            next_message_number,
            previous_chain_messages_count,
        }
    }

    /// Builds the plaintext header for the next outgoing message.
    pub(crate) fn prepare_header(&self, public_key: PublicKey) -> Header {
        Header {
            public_key,
            message_number: self.next_message_number,
            previous_chain_messages_count: self.previous_chain_messages_count,
        }
    }

    /// Encrypts the header and data, advancing the chain by one message.
    ///
    /// The encrypted header is bound to the ciphertext by authenticating
    /// `encrypted_header || auth` with the message body.
    pub(crate) fn encrypt(
        &mut self,
        crypto: &dyn Crypto,
        header: Header,
        data: &[u8],
        auth: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), Error> {
        let header_key = self
            .header_key
            .as_ref()
            .ok_or_else(|| Error::InvalidValue("header key is not set".to_string()))?;

        let encrypted_header = crypto
            .encrypt_header(header_key, &header)
            .map_err(|err| err.context_in_kind("encrypt header"))?;

        let message_key = self
            .advance(crypto)
            .map_err(|err| err.context("advance chain"))?;

        let auth = [encrypted_header.as_slice(), auth].concat();
        let encrypted_data = crypto
            .encrypt_message(&message_key, data, &auth)
            .map_err(|err| err.context_in_kind("encrypt message"))?;

        Ok((encrypted_header, encrypted_data))
    }

    /// Installs a fresh chain epoch after a Diffie-Hellman ratchet step.
    pub(crate) fn upgrade(&mut self, master_key: ChainKey, next_header_key: HeaderKey) {
        self.header_key = Some(std::mem::replace(&mut self.next_header_key, next_header_key));
        self.master_key = Some(master_key);
        self.previous_chain_messages_count = self.next_message_number;
        self.next_message_number = 0;
    }

    fn advance(&mut self, crypto: &dyn Crypto) -> Result<MessageKey, Error> {
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
