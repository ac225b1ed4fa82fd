//! Shared fixtures: a throwaway CSD generated at runtime and a reference invoice.
#![allow(dead_code)]

use chrono::NaiveDate;
use cfdi::config::Config;
use cfdi::core::*;
use rsa::pkcs8::EncodePrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use rust_decimal_macros::dec;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::Encode;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;

/// Serial of the generated certificate, as SAT would print it.
pub const NO_CERTIFICADO: &str = "30001000000500003416";
pub const PASSPHRASE: &str = "12345678a";

pub struct TestCsd {
    /// DER `.cer` contents.
    pub certificate: Vec<u8>,
    /// DER `.key` contents (PBES2 encrypted PKCS#8).
    pub key: Vec<u8>,
    pub public_key: RsaPublicKey,
}

/// Generated once per test binary; RSA key generation is slow.
pub fn csd() -> &'static TestCsd {
    static CSD: OnceLock<TestCsd> = OnceLock::new();
    CSD.get_or_init(generate_csd)
}

fn generate_csd() -> TestCsd {
    let mut rng = rand::thread_rng();
    let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
    let public_key = private.to_public_key();

    let plain = private.to_pkcs8_der().unwrap();
    let salt = [0x5a; 16];
    let iv = [0x3c; 16];
    let params =
        pkcs8::pkcs5::pbes2::Parameters::pbkdf2_sha256_aes256cbc(2048, &salt, &iv).unwrap();
    let key = pkcs8::PrivateKeyInfo::try_from(plain.as_bytes())
        .unwrap()
        .encrypt_with_params(params, PASSPHRASE)
        .unwrap()
        .as_bytes()
        .to_vec();

    let signer = rsa::pkcs1v15::SigningKey::<sha2::Sha256>::new(private);
    let certificate = CertificateBuilder::new(
        Profile::Root,
        SerialNumber::new(NO_CERTIFICADO.as_bytes()).unwrap(),
        Validity::from_now(Duration::from_secs(24 * 3600)).unwrap(),
        Name::from_str("CN=ESCUELA KEMPER URGATE SA DE CV,O=ESCUELA KEMPER URGATE SA DE CV,C=MX")
            .unwrap(),
        SubjectPublicKeyInfoOwned::from_key(public_key.clone()).unwrap(),
        &signer,
    )
    .unwrap()
    .build::<rsa::pkcs1v15::Signature>()
    .unwrap()
    .to_der()
    .unwrap();

    TestCsd {
        certificate,
        key,
        public_key,
    }
}

/// Write the CSD into `dir` as `csd.cer` / `csd.key`.
pub fn write_csd(dir: &Path) -> (PathBuf, PathBuf) {
    let cer = dir.join("csd.cer");
    let key = dir.join("csd.key");
    std::fs::write(&cer, &csd().certificate).unwrap();
    std::fs::write(&key, &csd().key).unwrap();
    (cer, key)
}

pub fn resources() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("resources")
}

pub fn config() -> Config {
    Config::new(
        resources().join("xslt/cadenaoriginal_4_0.xslt"),
        resources().join("catalogos"),
    )
}

pub fn fecha() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 15)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

/// One line item: `01010101`, 1 x 100, IVA 16 %.
pub fn fill_builder(builder: &mut InvoiceBuilder) {
    builder
        .set_issuer("AAA010101AAA", "Test SA", "601")
        .set_recipient("XAXX010101000", "PUBLICO EN GENERAL", "616", "42501", "S01")
        .set_line_items(vec![
            LineItemBuilder::new("01010101", dec!(1), "H87", "Venta", dec!(100))
                .traslado("002", TipoFactor::Tasa, dec!(0.16))
                .build(),
        ]);
}

pub fn attributes(builder: &InvoiceBuilder) -> InvoiceAttributes {
    InvoiceAttributes::new(fecha(), "42501")
        .serie("A")
        .folio("1")
        .forma_pago("01")
        .metodo_pago("PUE")
        .totals(&Totals::from_line_items(builder.line_items()))
}

/// Cadena original of the reference invoice sealed with the test CSD.
pub const REFERENCE_CADENA: &str = "||4.0|A|1|2024-06-15T12:00:00|01|30001000000500003416|100.00|MXN|116.00|I|01|PUE|42501\
|AAA010101AAA|Test SA|601\
|XAXX010101000|PUBLICO EN GENERAL|42501|616|S01\
|01010101|1.00|H87|Venta|100.00|100.00|02|100.00|002|Tasa|0.160000|16.00\
|100.00|002|Tasa|0.160000|16.00|16.00||";
