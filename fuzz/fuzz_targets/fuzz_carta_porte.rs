#![no_main]

use cfdi::cartaporte::{CartaPorte, CartaPorteAttributes};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let attrs = CartaPorteAttributes {
            transp_internac: Some(true),
            ..CartaPorteAttributes::default()
        };
        let _ = CartaPorte::new(s).attach(&attrs);
    }
});
