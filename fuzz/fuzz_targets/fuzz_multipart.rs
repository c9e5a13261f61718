//! Fuzz target: `UploadDecoder` in multipart mode
//!
//! The first input byte picks a chunk size; the rest is fed as a request
//! body.  The decoder must never panic, never emit data outside a file
//! part, and never report more bytes at `End` than it handed out.
//!
//! cargo fuzz run fuzz_multipart

#![no_main]

use clockclock::ota::upload::{UploadDecoder, UploadEvent};
use libfuzzer_sys::fuzz_target;

const CONTENT_TYPE: &str = "multipart/form-data; boundary=fuzzBoundary";

fuzz_target!(|data: &[u8]| {
    let Some((&chunk, body)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(chunk).max(1);

    let Ok(mut decoder) = UploadDecoder::from_headers(Some(CONTENT_TYPE), None) else {
        return;
    };

    let mut started = false;
    let mut ended = false;
    let mut seen: u64 = 0;
    let mut check = |ev: UploadEvent<'_>| match ev {
        UploadEvent::Start { .. } => {
            assert!(!started, "second file part must be ignored");
            started = true;
        }
        UploadEvent::Data(d) => {
            assert!(started && !ended, "data outside the file part");
            seen += d.len() as u64;
        }
        UploadEvent::End { total_size } => {
            assert!(started && !ended);
            assert_eq!(u64::from(total_size), seen);
            ended = true;
        }
        UploadEvent::Aborted => unreachable!("decoder never aborts"),
    };

    for piece in body.chunks(chunk) {
        if decoder.feed(piece, &mut check).is_err() {
            return;
        }
    }
    let _ = decoder.finish(&mut check);
});
