#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Parse, write, parse again; errors are fine, panics are bugs.
        if let Ok(root) = cfdi::xml::tree::parse(s) {
            if let Ok(xml) = root.to_xml() {
                let _ = cfdi::xml::tree::parse(&xml);
            }
        }
    }
});
