#[macro_use]
extern crate afl;
use pawl::{Crypto, DefaultCrypto, HeaderKey, Message, RootKey, Session};

fn get_session() -> Session {
    // The victim: a responder waiting for traffic from an attacker-controlled
    // transport.
    let (private_key, public_key) = DefaultCrypto
        .generate_key_pair()
        .expect("key pair generation");

    Session::new_responder(
        RootKey::from([0x42u8; 32]),
        HeaderKey::from([0x02u8; 32]),
        HeaderKey::from([0x01u8; 32]),
        private_key,
        public_key,
        None,
    )
    .expect("setup failed")
}

fn main() {
    let mut session = get_session();
    let associated_data = b"fuzz-context";

    fuzz!(|data: &[u8]| {
        if let Ok(message) = Message::from_bytes(data) {
            let _ = session.decrypt(
                &message.encrypted_header,
                &message.encrypted_data,
                associated_data,
            );
        }
    });
}
