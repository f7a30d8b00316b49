use blake2::Blake2b512;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use hmac::{Mac, SimpleHmac};
use rand_core::{OsRng, TryRngCore};
use sha2::Sha256;
use x25519_dalek::StaticSecret;
use zeroize::Zeroize;

use crate::error::Error;
use crate::header::Header;
use crate::keys::{ChainKey, HeaderKey, MessageKey, PrivateKey, PublicKey, RootKey, SharedKey};

pub(crate) const NONCE_SIZE: usize = 24; // XChaCha20-Poly1305 uses 24-byte (192-bit) nonces
const CIPHER_KEY_SIZE: usize = 32;
const ROOT_KEY_SIZE: usize = 32;
const CHAIN_KEY_SIZE: usize = 64;
const HEADER_KEY_SIZE: usize = 32;

const ROOT_INFO: &[u8] = b"Pawl-Root-Key";
const CHAIN_INFO: &[u8] = b"Pawl-Chain-Key";
const HEADER_INFO: &[u8] = b"Pawl-Next-Header-Key";
const MESSAGE_INFO: &[u8] = b"Pawl-Message-Keys";

const CHAIN_KEY_BYTE: u8 = 0x02;
const MESSAGE_KEY_BYTE: u8 = 0x01;

// The chain ratchet is an HMAC over BLAKE2b-512; BLAKE2 exposes no
// block-level API, hence SimpleHmac.
type ChainMac = SimpleHmac<Blake2b512>;

/// Cryptographic primitives used by a session.
///
/// The default provider implements X25519, HKDF-SHA256 for the root chain,
/// HMAC-BLAKE2b-512 for the message chains and XChaCha20-Poly1305 for both
/// AEAD surfaces. Substitute it through
/// [`SessionOption::Crypto`](crate::SessionOption::Crypto).
pub trait Crypto: Send + Sync {
    /// Generates a fresh Diffie-Hellman key pair.
    fn generate_key_pair(&self) -> Result<(PrivateKey, PublicKey), Error>;

    /// Computes the Diffie-Hellman shared secret.
    fn compute_shared_key(
        &self,
        private_key: &PrivateKey,
        public_key: &PublicKey,
    ) -> Result<SharedKey, Error>;

    /// Folds a Diffie-Hellman output into the root chain, producing the next
    /// root key, a fresh message-chain key and the next header key.
    fn advance_root_chain(
        &self,
        root_key: &RootKey,
        shared_key: &SharedKey,
    ) -> Result<(RootKey, ChainKey, HeaderKey), Error>;

    /// Advances a message chain one step, producing the next chain key and a
    /// one-shot message key.
    fn advance_message_chain(&self, chain_key: &ChainKey)
    -> Result<(ChainKey, MessageKey), Error>;

    /// Encrypts an encoded header; the blob is `nonce || ciphertext`.
    fn encrypt_header(&self, key: &HeaderKey, header: &Header) -> Result<Vec<u8>, Error>;

    /// Decrypts and decodes a header blob produced by [`Crypto::encrypt_header`].
    fn decrypt_header(&self, key: &HeaderKey, encrypted_header: &[u8]) -> Result<Header, Error>;

    /// Encrypts message data under a one-shot message key, authenticating
    /// `auth` alongside.
    fn encrypt_message(
        &self,
        key: &MessageKey,
        data: &[u8],
        auth: &[u8],
    ) -> Result<Vec<u8>, Error>;

    /// Inverse of [`Crypto::encrypt_message`].
    fn decrypt_message(
        &self,
        key: &MessageKey,
        encrypted_data: &[u8],
        auth: &[u8],
    ) -> Result<Vec<u8>, Error>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCrypto;

impl DefaultCrypto {
    fn x25519_private(key: &PrivateKey) -> Result<StaticSecret, Error> {
        let bytes: [u8; 32] = key
            .as_bytes()
            .try_into()
            .map_err(|_| Error::Crypto("private key must be 32 bytes".to_string()))?;

        Ok(StaticSecret::from(bytes))
    }

    fn x25519_public(key: &PublicKey) -> Result<x25519_dalek::PublicKey, Error> {
        let bytes: [u8; 32] = key
            .as_bytes()
            .try_into()
            .map_err(|_| Error::Crypto("public key must be 32 bytes".to_string()))?;

        Ok(x25519_dalek::PublicKey::from(bytes))
    }

    fn new_cipher(key: &[u8]) -> Result<XChaCha20Poly1305, Error> {
        XChaCha20Poly1305::new_from_slice(key)
            .map_err(|err| Error::Crypto(format!("new cipher: {err}")))
    }

    fn chain_mac(key: &[u8], input: u8) -> Result<Vec<u8>, Error> {
        let mut mac = <ChainMac as Mac>::new_from_slice(key)
            .map_err(|_| Error::Crypto("new chain MAC".to_string()))?;
        mac.update(&[input]);

        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn derive_message_cipher_key_and_nonce(key: &MessageKey) -> Result<(Vec<u8>, XNonce), Error> {
        let hkdf = Hkdf::<Sha256>::new(None, key.as_bytes());

        let mut material = [0u8; CIPHER_KEY_SIZE + NONCE_SIZE];
        hkdf.expand(MESSAGE_INFO, &mut material)
            .map_err(|_| Error::Crypto("HKDF expansion failed for message keys".to_string()))?;

        let cipher_key = material[..CIPHER_KEY_SIZE].to_vec();
        let nonce = XNonce::clone_from_slice(&material[CIPHER_KEY_SIZE..]);
        material.zeroize();

        Ok((cipher_key, nonce))
    }
}

impl Crypto for DefaultCrypto {
    fn generate_key_pair(&self) -> Result<(PrivateKey, PublicKey), Error> {
        let mut seed = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|_| Error::Crypto("random seed generation failed".to_string()))?;

        let private_key = StaticSecret::from(seed);
        let public_key = x25519_dalek::PublicKey::from(&private_key);
        seed.zeroize();

        Ok((
            PrivateKey::new(private_key.to_bytes().to_vec()),
            PublicKey::new(public_key.to_bytes().to_vec()),
        ))
    }

    fn compute_shared_key(
        &self,
        private_key: &PrivateKey,
        public_key: &PublicKey,
    ) -> Result<SharedKey, Error> {
        let private_key = Self::x25519_private(private_key)?;
        let public_key = Self::x25519_public(public_key)?;

        let shared_key = private_key.diffie_hellman(&public_key);
        if !shared_key.was_contributory() {
            return Err(Error::Crypto(
                "Diffie-Hellman output is not contributory".to_string(),
            ));
        }

        Ok(SharedKey::new(shared_key.to_bytes().to_vec()))
    }

    fn advance_root_chain(
        &self,
        root_key: &RootKey,
        shared_key: &SharedKey,
    ) -> Result<(RootKey, ChainKey, HeaderKey), Error> {
        let hkdf = Hkdf::<Sha256>::new(Some(root_key.as_bytes()), shared_key.as_bytes());

        let mut new_root_key = vec![0u8; ROOT_KEY_SIZE];
        hkdf.expand(ROOT_INFO, &mut new_root_key)
            .map_err(|_| Error::Crypto("HKDF expansion failed for root key".to_string()))?;

        let mut chain_key = vec![0u8; CHAIN_KEY_SIZE];
        hkdf.expand(CHAIN_INFO, &mut chain_key)
            .map_err(|_| Error::Crypto("HKDF expansion failed for chain key".to_string()))?;

        let mut next_header_key = vec![0u8; HEADER_KEY_SIZE];
        hkdf.expand(HEADER_INFO, &mut next_header_key)
            .map_err(|_| Error::Crypto("HKDF expansion failed for header key".to_string()))?;

        Ok((
            RootKey::new(new_root_key),
            ChainKey::new(chain_key),
            HeaderKey::new(next_header_key),
        ))
    }

    fn advance_message_chain(
        &self,
        chain_key: &ChainKey,
    ) -> Result<(ChainKey, MessageKey), Error> {
        let new_chain_key = Self::chain_mac(chain_key.as_bytes(), CHAIN_KEY_BYTE)?;
        let message_key = Self::chain_mac(chain_key.as_bytes(), MESSAGE_KEY_BYTE)?;

        Ok((ChainKey::new(new_chain_key), MessageKey::new(message_key)))
    }

    fn encrypt_header(&self, key: &HeaderKey, header: &Header) -> Result<Vec<u8>, Error> {
        let cipher = Self::new_cipher(key.as_bytes())?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|_| Error::Crypto("random nonce generation failed".to_string()))?;
        let nonce = XNonce::from(nonce_bytes);

        let mut ciphertext = cipher
            .encrypt(&nonce, header.encode().as_slice())
            .map_err(|_| Error::Crypto("header encryption failed".to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.append(&mut ciphertext);

        Ok(blob)
    }

    fn decrypt_header(&self, key: &HeaderKey, encrypted_header: &[u8]) -> Result<Header, Error> {
        if encrypted_header.len() <= NONCE_SIZE {
            return Err(Error::Crypto(format!(
                "encrypted header too short, expected at least {} bytes",
                NONCE_SIZE + 1
            )));
        }

        let cipher = Self::new_cipher(key.as_bytes())?;
        let nonce = XNonce::clone_from_slice(&encrypted_header[..NONCE_SIZE]);

        let header_bytes = cipher
            .decrypt(&nonce, &encrypted_header[NONCE_SIZE..])
            .map_err(|_| Error::Crypto("header decryption failed".to_string()))?;

        Header::decode(&header_bytes).map_err(|err| err.context("decode decrypted header"))
    }

    fn encrypt_message(
        &self,
        key: &MessageKey,
        data: &[u8],
        auth: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let (mut cipher_key, nonce) = Self::derive_message_cipher_key_and_nonce(key)
            .map_err(|err| err.context_in_kind("derive key and nonce"))?;

        let cipher = Self::new_cipher(&cipher_key)?;
        cipher_key.zeroize();

        cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: data,
                    aad: auth,
                },
            )
            .map_err(|_| Error::Crypto("message encryption failed".to_string()))
    }

    fn decrypt_message(
        &self,
        key: &MessageKey,
        encrypted_data: &[u8],
        auth: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let (mut cipher_key, nonce) = Self::derive_message_cipher_key_and_nonce(key)
            .map_err(|err| err.context_in_kind("derive key and nonce"))?;

        let cipher = Self::new_cipher(&cipher_key)?;
        cipher_key.zeroize();

        cipher
            .decrypt(
                &nonce,
                Payload {
                    msg: encrypted_data,
                    aad: auth,
                },
            )
            .map_err(|_| Error::Crypto("message decryption failed".to_string()))
    }
}
