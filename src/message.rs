use crate::error::Error;

/// An encrypted message: the encrypted header and the encrypted body.
///
/// [`Session::encrypt`](crate::Session::encrypt) returns the two parts; this
/// envelope is a convenience for transports that want a single byte string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Encrypted header: nonce followed by the sealed plaintext header.
    pub encrypted_header: Vec<u8>,
    /// Encrypted message payload.
    pub encrypted_data: Vec<u8>,
}

impl Message {
    pub fn new(encrypted_header: Vec<u8>, encrypted_data: Vec<u8>) -> Self {
        Self {
            encrypted_header,
            encrypted_data,
        }
    }

    /// Serializes as `[header length (4 bytes BE)][header][data]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(4 + self.encrypted_header.len() + self.encrypted_data.len());
        bytes.extend_from_slice(&(self.encrypted_header.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.encrypted_header);
        bytes.extend_from_slice(&self.encrypted_data);

        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < 4 {
            return Err(Error::InvalidValue(
                "not enough bytes for header length".to_string(),
            ));
        }

        let header_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        if bytes.len() < 4 + header_len {
            return Err(Error::InvalidValue("header length out of bounds".to_string()));
        }

        Ok(Self {
            encrypted_header: bytes[4..4 + header_len].to_vec(),
            encrypted_data: bytes[4 + header_len..].to_vec(),
        })
    }
}
