use std::sync::Arc;

use crate::config::{SessionConfig, SessionOption};
use crate::crypto::Crypto;
use crate::error::Error;
use crate::keys::{HeaderKey, PrivateKey, PublicKey, RootKey};
use crate::receiving::ReceivingChain;
use crate::sending::SendingChain;

/// A Double Ratchet session between two parties.
///
/// Turns a pre-shared root key and a pair of out-of-band negotiated header
/// keys into an unbounded sequence of authenticated, forward-secret message
/// encryptions. Every mutating operation works on a deep clone of the
/// session and swaps it in only on success, so a failed `encrypt` or
/// `decrypt` leaves the committed state byte-for-byte unchanged.
#[derive(Clone)]
pub struct Session {
    root_key: RootKey,
    local_private_key: PrivateKey,
    local_public_key: PublicKey,
    remote_public_key: Option<PublicKey>,
    sending_chain: SendingChain,
    receiving_chain: ReceivingChain,
    sending_chain_needs_upgrade: bool,
    crypto: Arc<dyn Crypto>,
}

impl Session {
    /// Creates the initiating side of a session.
    ///
    /// The initiator knows the responder's public key from the session
    /// bootstrap and generates a fresh Diffie-Hellman pair of its own. Its
    /// sending chain is populated on the first [`Session::encrypt`].
    pub fn new_initiator(
        root_key: RootKey,
        sending_next_header_key: HeaderKey,
        receiving_next_header_key: HeaderKey,
        remote_public_key: PublicKey,
        options: impl IntoIterator<Item = SessionOption>,
    ) -> Result<Self, Error> {
        let config = SessionConfig::new(options);

        let (local_private_key, local_public_key) = config
            .crypto
            .generate_key_pair()
            .map_err(|err| err.context_in_kind("generate key pair"))?;

        Ok(Self {
            root_key,
            local_private_key,
            local_public_key,
            remote_public_key: Some(remote_public_key),
            sending_chain: SendingChain::new(None, None, sending_next_header_key, 0, 0),
            receiving_chain: ReceivingChain::new(receiving_next_header_key, config.skipped_keys),
            sending_chain_needs_upgrade: true,
            crypto: config.crypto,
        })
    }

    /// Creates the responding side of a session.
    ///
    /// The responder supplies the Diffie-Hellman pair whose public half the
    /// initiator encrypted against, then waits for the first inbound message
    /// to complete the ratchet handshake.
    pub fn new_responder(
        root_key: RootKey,
        sending_next_header_key: HeaderKey,
        receiving_next_header_key: HeaderKey,
        local_private_key: PrivateKey,
        local_public_key: PublicKey,
        options: impl IntoIterator<Item = SessionOption>,
    ) -> Result<Self, Error> {
        let config = SessionConfig::new(options);

        Ok(Self {
            root_key,
            local_private_key,
            local_public_key,
            remote_public_key: None,
            sending_chain: SendingChain::new(None, None, sending_next_header_key, 0, 0),
            receiving_chain: ReceivingChain::new(receiving_next_header_key, config.skipped_keys),
            sending_chain_needs_upgrade: false,
            crypto: config.crypto,
        })
    }

    /// The session's current Diffie-Hellman public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.local_public_key
    }

    /// Encrypts `data`, returning the encrypted header and encrypted body.
    ///
    /// `auth` is authenticated alongside the message and must be presented
    /// unchanged to [`Session::decrypt`].
    pub fn encrypt(&mut self, data: &[u8], auth: &[u8]) -> Result<(Vec<u8>, Vec<u8>), Error> {
        let mut session = self.clone();
        let encrypted = session.encrypt_in_place(data, auth)?;
        *self = session;

        Ok(encrypted)
    }

    /// Decrypts a message produced by the peer's `encrypt`.
    ///
    /// Out-of-order messages are handled through the skipped-key store; a
    /// header carrying a new remote public key triggers the Diffie-Hellman
    /// ratchet step.
    pub fn decrypt(
        &mut self,
        encrypted_header: &[u8],
        encrypted_data: &[u8],
        auth: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let mut session = self.clone();
        let data = session.decrypt_in_place(encrypted_header, encrypted_data, auth)?;
        *self = session;

        Ok(data)
    }

    fn encrypt_in_place(&mut self, data: &[u8], auth: &[u8]) -> Result<(Vec<u8>, Vec<u8>), Error> {
        if self.sending_chain_needs_upgrade {
            self.upgrade_sending_chain()
                .map_err(|err| err.context("upgrade sending chain"))?;
        }

        let header = self.sending_chain.prepare_header(self.local_public_key.clone());
        self.sending_chain
            .encrypt(self.crypto.as_ref(), header, data, auth)
    }

    fn decrypt_in_place(
        &mut self,
        encrypted_header: &[u8],
        encrypted_data: &[u8],
        auth: &[u8],
    ) -> Result<Vec<u8>, Error> {
        if let Some(data) = self.receiving_chain.try_skipped_keys(
            self.crypto.as_ref(),
            encrypted_header,
            encrypted_data,
            auth,
        )? {
            return Ok(data);
        }

        let (header, needs_ratchet_step) = self
            .receiving_chain
            .match_header(self.crypto.as_ref(), encrypted_header)?;

        if needs_ratchet_step {
            // Finish the old epoch before rotating: keys for not-yet-arrived
            // messages of the previous chain stay retrievable.
            self.receiving_chain
                .skip_message_keys(self.crypto.as_ref(), header.previous_chain_messages_count)
                .map_err(|err| err.context("skip previous chain message keys"))?;

            self.dh_ratchet(&header.public_key)
                .map_err(|err| err.context("ratchet step"))?;
        }

        self.receiving_chain
            .skip_message_keys(self.crypto.as_ref(), header.message_number)
            .map_err(|err| err.context("skip message keys"))?;

        let message_key = self
            .receiving_chain
            .advance(self.crypto.as_ref())
            .map_err(|err| err.context("advance receiving chain"))?;

        let auth = [encrypted_header, auth].concat();
        self.crypto
            .decrypt_message(&message_key, encrypted_data, &auth)
            .map_err(|err| err.context_in_kind("decrypt message"))
    }

    /// Performs the sending half of a Diffie-Hellman ratchet step, deferred
    /// from initiator construction.
    fn upgrade_sending_chain(&mut self) -> Result<(), Error> {
        let remote_public_key = self
            .remote_public_key
            .as_ref()
            .ok_or_else(|| Error::InvalidValue("remote public key is not set".to_string()))?;

        let shared_key = self
            .crypto
            .compute_shared_key(&self.local_private_key, remote_public_key)
            .map_err(|err| err.context_in_kind("compute shared key"))?;

        let (root_key, chain_key, next_header_key) = self
            .crypto
            .advance_root_chain(&self.root_key, &shared_key)
            .map_err(|err| err.context_in_kind("advance root chain"))?;

        self.root_key = root_key;
        self.sending_chain.upgrade(chain_key, next_header_key);
        self.sending_chain_needs_upgrade = false;

        Ok(())
    }

    /// The Diffie-Hellman ratchet step: folds the incoming public key into
    /// the root chain for the receiving side, generates a fresh local pair
    /// and folds again for the sending side.
    fn dh_ratchet(&mut self, remote_public_key: &PublicKey) -> Result<(), Error> {
        let shared_key = self
            .crypto
            .compute_shared_key(&self.local_private_key, remote_public_key)
            .map_err(|err| err.context_in_kind("compute receiving shared key"))?;
        let (root_key, chain_key, next_header_key) = self
            .crypto
            .advance_root_chain(&self.root_key, &shared_key)
            .map_err(|err| err.context_in_kind("advance root chain for receiving"))?;
        self.root_key = root_key;
        self.receiving_chain.upgrade(chain_key, next_header_key);

        let (local_private_key, local_public_key) = self
            .crypto
            .generate_key_pair()
            .map_err(|err| err.context_in_kind("generate key pair"))?;
        self.local_private_key = local_private_key;
        self.local_public_key = local_public_key;

        let shared_key = self
            .crypto
            .compute_shared_key(&self.local_private_key, remote_public_key)
            .map_err(|err| err.context_in_kind("compute sending shared key"))?;
        let (root_key, chain_key, next_header_key) = self
            .crypto
            .advance_root_chain(&self.root_key, &shared_key)
            .map_err(|err| err.context_in_kind("advance root chain for sending"))?;
        self.root_key = root_key;
        self.sending_chain.upgrade(chain_key, next_header_key);

        self.remote_public_key = Some(remote_public_key.clone());
        self.sending_chain_needs_upgrade = false;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::DefaultCrypto;
    use crate::error::ErrorKind;
    use crate::skipped_keys::InMemorySkippedKeys;

    /// Byte-level view of everything a session owns, for atomicity checks.
    fn fingerprint(session: &Session) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(session.root_key.as_bytes());
        bytes.extend_from_slice(session.local_private_key.as_bytes());
        bytes.extend_from_slice(session.local_public_key.as_bytes());
        if let Some(remote) = &session.remote_public_key {
            bytes.extend_from_slice(remote.as_bytes());
        }

        let sending = &session.sending_chain;
        if let Some(master) = &sending.master_key {
            bytes.extend_from_slice(master.as_bytes());
        }
        if let Some(header_key) = &sending.header_key {
            bytes.extend_from_slice(header_key.as_bytes());
        }
        bytes.extend_from_slice(sending.next_header_key.as_bytes());
        bytes.extend_from_slice(&sending.next_message_number.to_le_bytes());
        bytes.extend_from_slice(&sending.previous_chain_messages_count.to_le_bytes());

        let receiving = &session.receiving_chain;
        if let Some(master) = &receiving.master_key {
            bytes.extend_from_slice(master.as_bytes());
        }
        if let Some(header_key) = &receiving.header_key {
            bytes.extend_from_slice(header_key.as_bytes());
        }
        bytes.extend_from_slice(receiving.next_header_key.as_bytes());
        bytes.extend_from_slice(&receiving.next_message_number.to_le_bytes());

        let mut skipped: Vec<(Vec<u8>, u64, Vec<u8>)> = Vec::new();
        for (header_key, bucket) in receiving.skipped_keys.iter() {
            for (number, message_key) in bucket {
                skipped.push((
                    header_key.as_bytes().to_vec(),
                    number,
                    message_key.as_bytes().to_vec(),
                ));
            }
        }
        skipped.sort();
        for (header_key, number, message_key) in skipped {
            bytes.extend_from_slice(&header_key);
            bytes.extend_from_slice(&number.to_le_bytes());
            bytes.extend_from_slice(&message_key);
        }

        bytes.push(session.sending_chain_needs_upgrade as u8);
        bytes
    }

    fn skipped_keys_count(session: &Session) -> usize {
        session
            .receiving_chain
            .skipped_keys
            .iter()
            .map(|(_, bucket)| bucket.count())
            .sum()
    }

    fn create_sessions_with(options: Vec<SessionOption>) -> (Session, Session) {
        let (responder_private, responder_public) = DefaultCrypto.generate_key_pair().unwrap();

        let root_key = RootKey::from([11u8; 32]);
        let initiator_sending_hk = HeaderKey::from([22u8; 32]);
        let responder_sending_hk = HeaderKey::from([33u8; 32]);

        let initiator = Session::new_initiator(
            root_key.clone(),
            initiator_sending_hk.clone(),
            responder_sending_hk.clone(),
            responder_public.clone(),
            None,
        )
        .unwrap();

        let responder = Session::new_responder(
            root_key,
            responder_sending_hk,
            initiator_sending_hk,
            responder_private,
            responder_public,
            options,
        )
        .unwrap();

        (initiator, responder)
    }

    fn create_sessions() -> (Session, Session) {
        create_sessions_with(Vec::new())
    }

    #[test]
    fn test_round_trip_and_ratchet_step() {
        let (mut alice, mut bob) = create_sessions();
        assert!(alice.sending_chain_needs_upgrade);

        let (encrypted_header, encrypted_data) = alice.encrypt(b"hello", b"a->b").unwrap();
        assert!(!alice.sending_chain_needs_upgrade);

        let data = bob.decrypt(&encrypted_header, &encrypted_data, b"a->b").unwrap();
        assert_eq!(data, b"hello");

        // Bob's first decrypt fired the ratchet step: his sending chain got
        // a header key and a reset counter.
        assert!(bob.sending_chain.header_key.is_some());
        assert_eq!(bob.sending_chain.next_message_number, 0);

        assert!(alice.receiving_chain.header_key.is_none());
        let (encrypted_header, encrypted_data) = bob.encrypt(b"hi", b"b->a").unwrap();
        let data = alice.decrypt(&encrypted_header, &encrypted_data, b"b->a").unwrap();
        assert_eq!(data, b"hi");

        // Alice's receive-chain header key changed when she consumed Bob's
        // new-epoch message.
        assert!(alice.receiving_chain.header_key.is_some());
    }

    #[test]
    fn test_out_of_order_delivery() {
        let (mut alice, mut bob) = create_sessions();

        let first = alice.encrypt(b"m1", b"").unwrap();
        let second = alice.encrypt(b"m2", b"").unwrap();
        let third = alice.encrypt(b"m3", b"").unwrap();

        assert_eq!(bob.decrypt(&third.0, &third.1, b"").unwrap(), b"m3");
        assert_eq!(skipped_keys_count(&bob), 2);

        assert_eq!(bob.decrypt(&first.0, &first.1, b"").unwrap(), b"m1");
        assert_eq!(bob.decrypt(&second.0, &second.1, b"").unwrap(), b"m2");

        assert_eq!(
            skipped_keys_count(&bob),
            0,
            "consumed epoch must leave no skipped keys behind"
        );
    }

    #[test]
    fn test_decrypt_failure_leaves_state_unchanged() {
        let (mut alice, mut bob) = create_sessions();

        let (encrypted_header, encrypted_data) = alice.encrypt(b"payload", b"aad").unwrap();
        let committed = fingerprint(&bob);

        let mut tampered_header = encrypted_header.clone();
        tampered_header[3] ^= 0x40;
        let err = bob
            .decrypt(&tampered_header, &encrypted_data, b"aad")
            .unwrap_err();
        assert!(err.is(ErrorKind::Crypto));
        assert_eq!(fingerprint(&bob), committed);

        let mut tampered_data = encrypted_data.clone();
        tampered_data[0] ^= 0x01;
        let err = bob
            .decrypt(&encrypted_header, &tampered_data, b"aad")
            .unwrap_err();
        assert!(err.is(ErrorKind::Crypto));
        assert_eq!(fingerprint(&bob), committed);

        let err = bob
            .decrypt(&encrypted_header, &encrypted_data, b"wrong aad")
            .unwrap_err();
        assert!(err.is(ErrorKind::Crypto));
        assert_eq!(fingerprint(&bob), committed);

        // The untampered message still decrypts after all those failures.
        let data = bob.decrypt(&encrypted_header, &encrypted_data, b"aad").unwrap();
        assert_eq!(data, b"payload");
    }

    #[test]
    fn test_skipping_past_storage_bound_fails_atomically() {
        let storage = InMemorySkippedKeys::with_limits(2, 4).unwrap();
        let (mut alice, mut bob) =
            create_sessions_with(vec![SessionOption::SkippedKeysStorage(Box::new(storage))]);

        let mut messages = Vec::new();
        for index in 0..5u8 {
            messages.push(alice.encrypt(&[index], b"").unwrap());
        }

        let committed = fingerprint(&bob);

        // Decrypting the fifth message would require storing four skipped
        // keys, two more than the store accepts.
        let (encrypted_header, encrypted_data) = &messages[4];
        let err = bob.decrypt(encrypted_header, encrypted_data, b"").unwrap_err();
        assert!(err.is(ErrorKind::Storage));
        assert_eq!(fingerprint(&bob), committed);

        // The first message is still in reach.
        let (encrypted_header, encrypted_data) = &messages[0];
        assert_eq!(bob.decrypt(encrypted_header, encrypted_data, b"").unwrap(), &[0]);
    }

    #[test]
    fn test_clone_independence() {
        let (mut alice, mut bob) = create_sessions();
        let message = alice.encrypt(b"hello", b"").unwrap();
        bob.decrypt(&message.0, &message.1, b"").unwrap();

        let frozen = bob.clone();
        let before = fingerprint(&frozen);

        let reply = bob.encrypt(b"reply", b"").unwrap();
        alice.decrypt(&reply.0, &reply.1, b"").unwrap();

        assert_eq!(fingerprint(&frozen), before, "clone must not follow the origin");
        assert_ne!(fingerprint(&bob), before);
        assert_ne!(
            frozen.root_key.as_bytes().as_ptr(),
            bob.root_key.as_bytes().as_ptr(),
            "clone must own its key bytes"
        );
    }

    #[test]
    fn test_encrypt_failure_leaves_state_unchanged() {
        let (_, mut bob) = create_sessions();
        let committed = fingerprint(&bob);

        // The responder has no sending header key until a ratchet step.
        let err = bob.encrypt(b"too early", b"").unwrap_err();
        assert!(err.is(ErrorKind::InvalidValue));
        assert_eq!(fingerprint(&bob), committed);
    }

    #[test]
    fn test_many_alternating_messages_rotate_keys() {
        let (mut alice, mut bob) = create_sessions();
        let initial_public = alice.public_key().clone();

        for round in 0..4u8 {
            let (header, data) = alice.encrypt(&[round], b"").unwrap();
            assert_eq!(bob.decrypt(&header, &data, b"").unwrap(), &[round]);

            let (header, data) = bob.encrypt(&[round, round], b"").unwrap();
            assert_eq!(alice.decrypt(&header, &data, b"").unwrap(), &[round, round]);
        }

        assert_ne!(
            alice.public_key(),
            &initial_public,
            "the ratchet must have rotated the local key pair"
        );
    }
}
