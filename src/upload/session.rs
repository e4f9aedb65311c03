use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Identity sent with every request in one upload session.
///
/// The collector orders and de-duplicates requests by `(nonce, sequence)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    nonce: String,
    sequence: u64,
}

impl SessionIdentity {
    /// A fresh random nonce with the sequence at 0.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::random();
        Self {
            nonce: URL_SAFE_NO_PAD.encode(bytes),
            sequence: 0,
        }
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Value of the `X-HsReport-Id` header.
    pub fn report_id(&self) -> String {
        format!("{} {}", self.nonce, self.sequence)
    }

    /// Called once per exchange that completed without a transport error.
    pub fn advance(&mut self) {
        self.sequence += 1;
    }
}
