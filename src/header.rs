use crate::error::Error;
use crate::keys::PublicKey;

const COUNTERS_SIZE: usize = 16;

/// Plaintext header carried (encrypted) with every message.
///
/// Wire layout: message number as little-endian u64, previous sending-chain
/// messages count as little-endian u64, then the raw public-key bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub public_key: PublicKey,
    pub message_number: u64,
    pub previous_chain_messages_count: u64,
}

impl Header {
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(COUNTERS_SIZE + self.public_key.len());
        bytes.extend_from_slice(&self.message_number.to_le_bytes());
        bytes.extend_from_slice(&self.previous_chain_messages_count.to_le_bytes());
        bytes.extend_from_slice(self.public_key.as_bytes());

        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < COUNTERS_SIZE {
            return Err(Error::InvalidValue("not enough bytes".to_string()));
        }

        let mut number_bytes = [0u8; 8];
        number_bytes.copy_from_slice(&bytes[0..8]);

        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&bytes[8..16]);

        Ok(Self {
            public_key: PublicKey::new(bytes[COUNTERS_SIZE..].to_vec()),
            message_number: u64::from_le_bytes(number_bytes),
            previous_chain_messages_count: u64::from_le_bytes(count_bytes),
        })
    }
}
