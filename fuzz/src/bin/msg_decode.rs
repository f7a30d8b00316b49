#[macro_use]
extern crate afl;
use pawl::{Header, Message};

fn main() {
    fuzz!(|data: &[u8]| {
        if let Ok(message) = Message::from_bytes(data) {
            let _ = Header::decode(&message.encrypted_header);
        }
        let _ = Header::decode(data);
    });
}
