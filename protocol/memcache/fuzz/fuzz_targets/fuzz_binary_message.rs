#![no_main]

use libfuzzer_sys::fuzz_target;
use protocol_memcache::binary::{HEADER_LEN, Message};

fuzz_target!(|data: &[u8]| {
    // Framing must never panic, whatever the length fields claim
    if let Ok((message, consumed)) = Message::parse(data) {
        assert!(consumed >= HEADER_LEN);
        assert!(consumed <= data.len());

        let body = message.extras.len() + message.key.len() + message.value.len();
        assert_eq!(body, message.header.body_len as usize);

        // Re-encoding a parsed message is byte-identical when the length
        // fields were consistent
        if message.header.extras_len as usize + message.header.key_len as usize <= body {
            let encoded = message.to_bytes().unwrap();
            assert_eq!(&encoded[..], &data[..consumed]);
        }
    }
});
