//! PII protection seam.
//!
//! Responses to tools in the configured sensitive set never touch storage in
//! plaintext. The codec itself is a collaborator: deployments plug in their
//! KMS-backed implementation, tests plug in fakes. The engine only knows the
//! contract:
//!
//! - encrypt failure on save **rejects the save** (never store plaintext);
//! - decrypt failure on read yields a **missing response** (never surface
//!   ciphertext, never fail the read).

use waybook_types::SessionId;

/// Encrypts and decrypts sensitive response text, keyed per session.
pub trait PiiCodec: Send + Sync {
    /// `None` means encryption failed and the value must not be stored.
    fn encrypt(&self, session: SessionId, plaintext: &str) -> Option<String>;

    /// `None` means the ciphertext could not be recovered; callers treat
    /// the response as absent.
    fn decrypt(&self, session: SessionId, ciphertext: &str) -> Option<String>;
}

/// Identity codec for deployments without a PII backend configured.
///
/// Only safe when `sensitive_tool_ids` is empty; the server logs a warning
/// when it starts with sensitive ids but no real codec.
pub struct IdentityCodec;

impl PiiCodec for IdentityCodec {
    fn encrypt(&self, _session: SessionId, plaintext: &str) -> Option<String> {
        Some(plaintext.to_string())
    }

    fn decrypt(&self, _session: SessionId, ciphertext: &str) -> Option<String> {
        Some(ciphertext.to_string())
    }
}
