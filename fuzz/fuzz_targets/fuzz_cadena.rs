#![no_main]

use std::path::Path;
use std::sync::OnceLock;

use cfdi::sello::{self, CadenaTransform, Unsealed};
use libfuzzer_sys::fuzz_target;

fn transform() -> &'static CadenaTransform {
    static TRANSFORM: OnceLock<CadenaTransform> = OnceLock::new();
    TRANSFORM.get_or_init(|| {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../resources/xslt/cadenaoriginal_4_0.xslt");
        CadenaTransform::compile(&sello::resolve(root).unwrap()).unwrap()
    })
}

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(unsealed) = Unsealed::parse(s) {
            let _ = unsealed.canonicalize(transform());
        }
    }
});
