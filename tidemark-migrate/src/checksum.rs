//! Migration checksums.
//!
//! A checksum is a signed 32-bit fingerprint taken from the leading bytes of a
//! SHA-256 digest. Inputs are folded in the order they are supplied, so two
//! calculators fed the same bytes and deltas in the same order agree.

use sha2::{Digest, Sha256};

/// Incremental checksum accumulator.
#[derive(Debug, Clone, Default)]
pub struct ChecksumCalculator {
    hasher: Sha256,
}

impl ChecksumCalculator {
    /// Create an empty calculator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold raw bytes into the checksum.
    pub fn update(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.hasher.update(bytes.as_ref());
        self
    }

    /// Fold a numeric delta into the checksum.
    pub fn update_delta(&mut self, delta: i64) -> &mut Self {
        self.hasher.update(delta.to_be_bytes());
        self
    }

    /// Fold a script body into the checksum, one line at a time.
    ///
    /// Line terminators and a leading byte-order mark are not part of the
    /// fingerprint.
    pub fn update_script(&mut self, content: &str) -> &mut Self {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        for line in content.lines() {
            self.hasher.update(line.as_bytes());
        }
        self
    }

    /// Finish and return the 32-bit checksum.
    pub fn finish(self) -> i32 {
        let digest = self.hasher.finalize();
        i32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
    }
}

/// Checksum of a script body.
pub fn script_checksum(content: &str) -> i32 {
    let mut calculator = ChecksumCalculator::new();
    calculator.update_script(content);
    calculator.finish()
}

/// Derive a stable 64-bit key from a name, e.g. for advisory locks.
pub fn name_key(name: &str) -> i64 {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_input_same_checksum() {
        assert_eq!(
            script_checksum("CREATE TABLE users (id INT);"),
            script_checksum("CREATE TABLE users (id INT);")
        );
        assert_ne!(
            script_checksum("CREATE TABLE users (id INT);"),
            script_checksum("CREATE TABLE users (id BIGINT);")
        );
    }

    #[test]
    fn test_line_endings_ignored() {
        let unix = "CREATE TABLE a (id INT);\nCREATE TABLE b (id INT);\n";
        let windows = "CREATE TABLE a (id INT);\r\nCREATE TABLE b (id INT);\r\n";
        let bom = "\u{feff}CREATE TABLE a (id INT);\nCREATE TABLE b (id INT);";
        assert_eq!(script_checksum(unix), script_checksum(windows));
        assert_eq!(script_checksum(unix), script_checksum(bom));
    }

    #[test]
    fn test_order_sensitive() {
        let mut a = ChecksumCalculator::new();
        a.update("first").update_delta(7).update("second");

        let mut b = ChecksumCalculator::new();
        b.update("first").update_delta(7).update("second");

        let mut c = ChecksumCalculator::new();
        c.update("second").update_delta(7).update("first");

        let (a, b, c) = (a.finish(), b.finish(), c.finish());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_deltas_change_checksum() {
        let mut a = ChecksumCalculator::new();
        a.update("body").update_delta(1);
        let mut b = ChecksumCalculator::new();
        b.update("body").update_delta(2);
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_name_key_is_stable() {
        assert_eq!(name_key("schema_history"), name_key("schema_history"));
        assert_ne!(name_key("schema_history"), name_key("other_history"));
    }
}
