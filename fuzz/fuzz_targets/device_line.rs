#![no_main]

use libfuzzer_sys::fuzz_target;
use porchlight_core::decoder::{decode_line, ButtonCallback, Dispatch, EventDecoder};

fn noop() -> ButtonCallback {
    Box::new(|| {})
}

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    let _ = decode_line(&line);

    let mut decoder = EventDecoder::new()
        .with_buttons(vec![Some(noop()), None, Some(noop())])
        .with_heartbeat(Box::new(|_| {}));
    if let Dispatch::Button { index } = decoder.handle_line(&line) {
        assert!(index == 0 || index == 2);
    }
});
