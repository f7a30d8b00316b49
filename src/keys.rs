use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

macro_rules! byte_key {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Default, PartialEq, Eq, Hash, Zeroize, ZeroizeOnDrop)]
        pub struct $name(Vec<u8>);

        impl $name {
            pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
                Self(bytes.into())
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes.to_vec())
            }
        }

        // Key material stays out of Debug output.
        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({} bytes)"), self.0.len())
            }
        }
    };
}

byte_key!(
    /// X25519 private scalar, 32 bytes by convention.
    PrivateKey
);

byte_key!(
    /// X25519 public point, 32 bytes by convention.
    PublicKey
);

byte_key!(
    /// Diffie-Hellman output, 32 bytes by convention.
    SharedKey
);

byte_key!(
    /// Current root-chain key, 32 bytes by convention.
    RootKey
);

byte_key!(
    /// Symmetric key encrypting message headers, 32 bytes by convention.
    HeaderKey
);

byte_key!(
    /// Rolling state of a symmetric message chain, 64 bytes.
    ///
    /// Advancing the chain overwrites the previous value; it is never
    /// retained.
    ChainKey
);

byte_key!(
    /// One-shot key for a single message, 64 bytes.
    ///
    /// Split into an AEAD cipher key and nonce at encryption time. Skipped
    /// message keys are retained only until used or evicted.
    MessageKey
);
