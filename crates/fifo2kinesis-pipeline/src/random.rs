//! Random token generation for partition keys and retry-file names.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// A uniformly random string over `A-Z a-z 0-9`.
///
/// Not cryptographic; used to spread records across shards and to make
/// retry-file names collision-resistant.
pub fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length() {
        assert_eq!(random_alphanumeric(12).len(), 12);
        assert_eq!(random_alphanumeric(8).len(), 8);
        assert_eq!(random_alphanumeric(0).len(), 0);
    }

    #[test]
    fn test_alphabet() {
        let token = random_alphanumeric(256);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_tokens_differ() {
        // Collisions over 12 alphanumeric chars are vanishingly unlikely.
        assert_ne!(random_alphanumeric(12), random_alphanumeric(12));
    }
}
