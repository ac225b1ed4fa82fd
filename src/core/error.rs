use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while assembling, sealing or decorating a CFDI.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CfdiError {
    /// Certificate or private key material could not be used.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The cadena original template set is missing, cyclic or malformed.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Sealing was requested without the required material.
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// The Carta Porte complement could not be attached.
    #[error(transparent)]
    Complement(#[from] ComplementError),

    /// A SAT catalog file could not be read.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// XML generation or parsing error.
    #[error(transparent)]
    Xml(#[from] XmlError),
}

/// Certificate (`.cer`) and private key (`.key`) loading failures.
///
/// Messages never include the passphrase or any key bytes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CredentialError {
    #[error("cannot read credential file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input is not a DER encoded X.509 certificate.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// The input is not a DER encoded PKCS#8 encrypted private key.
    #[error("malformed private key container")]
    MalformedPrivateKey,

    /// Decryption failed, almost always because of a wrong passphrase.
    #[error("cannot decrypt private key: wrong passphrase or corrupted container")]
    Decryption,

    /// The decrypted key is not an RSA key.
    #[error("private key is not an RSA key")]
    UnsupportedKey,

    #[error("cannot encode credential: {0}")]
    Encoding(String),
}

/// Canonicalization template failures. These indicate a broken install of the
/// template set rather than something the caller can fix per document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TemplateError {
    #[error("cannot read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse template {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// An `xsl:include` without an `href`.
    #[error("include directive without href in {path}")]
    MissingHref { path: PathBuf },

    /// A template includes itself, directly or through other templates.
    #[error("cyclic include of {path}")]
    Cycle { path: PathBuf },

    /// An included template binds a prefix to a different namespace.
    #[error("prefix '{prefix}' bound to both {first} and {second}")]
    NamespaceConflict {
        prefix: String,
        first: String,
        second: String,
    },

    /// A prefix used in a pattern or select expression is not declared.
    #[error("undeclared prefix '{0}'")]
    UnboundPrefix(String),

    /// The template still contains inclusion directives.
    #[error("template still contains include directives")]
    UnresolvedInclude,

    /// An instruction or expression outside the supported subset.
    #[error("unsupported template construct: {0}")]
    Unsupported(String),
}

/// Sealing failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SigningError {
    #[error("private key not provided")]
    MissingPrivateKey,

    #[error("certificate not provided")]
    MissingCertificate,

    /// The document root is not a `cfdi:Comprobante`.
    #[error("document root is not cfdi:Comprobante")]
    NotAnInvoice,

    #[error("signature error: {0}")]
    Signature(String),
}

/// Carta Porte attachment failures.
///
/// [`ComplementError::AlreadyStamped`] and [`ComplementError::MissingDocument`]
/// are expected business outcomes the caller branches on.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ComplementError {
    #[error("this XML has already been stamped")]
    AlreadyStamped,

    #[error("no XML document was provided")]
    MissingDocument,

    #[error("document root is not cfdi:Comprobante")]
    NotAnInvoice,

    #[error(transparent)]
    Xml(#[from] XmlError),
}

impl ComplementError {
    /// `true` for the business outcomes a caller is expected to handle.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::AlreadyStamped | Self::MissingDocument)
    }
}

/// Catalog file failures. A missing catalog or key is not an error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("error importing catalog \"{name}\": {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing catalog \"{name}\": {message}")]
    Parse { name: String, message: String },

    #[error("catalog \"{0}\" is not a list of records")]
    NotAList(String),
}

/// XML reading or writing failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum XmlError {
    #[error("XML parse error: {0}")]
    Parse(String),

    #[error("XML write error: {0}")]
    Write(String),
}
