//! Response signing.
//!
//! # Responsibilities
//! - Load an RSA private key from PEM (PKCS#1 or PKCS#8)
//! - Sign response bodies with PKCS#1 v1.5 over SHA-1
//! - Name the response header carrying the signature
//!
//! # Design Decisions
//! - The signed digest is `sha1(sha1(body))`, which existing clients verify
//! - Signing failures are logged by the caller and leave the response unsigned

use std::path::Path;

use axum::http::HeaderName;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("failed to read private key {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid RSA private key: {0}")]
    InvalidKey(String),

    #[error("invalid signature header name: {0}")]
    InvalidHeader(String),

    #[error("signing failed: {0}")]
    Sign(#[from] rsa::Error),
}

#[derive(Debug, Clone)]
pub struct ResponseSigner {
    key: RsaPrivateKey,
    header: HeaderName,
}

impl ResponseSigner {
    pub fn new(key: RsaPrivateKey, header: HeaderName) -> Self {
        Self { key, header }
    }

    pub fn from_pem(pem: &str, header: &str) -> Result<Self, SignatureError> {
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
        let header = HeaderName::from_bytes(header.trim().as_bytes())
            .map_err(|_| SignatureError::InvalidHeader(header.to_string()))?;
        Ok(Self::new(key, header))
    }

    pub fn from_file(path: impl AsRef<Path>, header: &str) -> Result<Self, SignatureError> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|source| SignatureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_pem(&pem, header)
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.key.to_public_key()
    }

    /// Base64 signature of `body`.
    pub fn sign(&self, body: &[u8]) -> Result<String, SignatureError> {
        let signature = self.key.sign(Pkcs1v15Sign::new::<Sha1>(), &digest(body))?;
        Ok(STANDARD.encode(signature))
    }
}

/// The digest covered by the signature.
pub fn digest(body: &[u8]) -> Vec<u8> {
    Sha1::digest(Sha1::digest(body)).to_vec()
}
