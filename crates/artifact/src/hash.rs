use sha2::{Digest, Sha256};

/// Lowercase hex sha256 of the operation text, as sent in persisted query requests.
pub fn operation_hash(text: &str) -> String {
    let digest = <Sha256 as Digest>::digest(text.as_bytes());
    hex::encode(digest)
}
