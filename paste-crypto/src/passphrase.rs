//! Structural validation of the human-shareable passphrase format
//! (`word-word-...-word-suffix`), independent of key derivation so both the
//! sender and any standalone passphrase-format checker can call it.

use paste_api_types::InputError;

/// Validate that `passphrase` matches `^[a-z]{3,8}(-[a-z]{3,8}){2,7}-[a-z0-9]{4}$`
/// with the trailing four-character block containing at least one digit, and
/// is not a URL.
pub fn validate(passphrase: &str) -> Result<(), InputError> {
    if passphrase.contains("://") || passphrase.starts_with("http") {
        return Err(InputError::MalformedPassphrase);
    }

    let parts: Vec<&str> = passphrase.split('-').collect();
    if parts.len() < 4 || parts.len() > 9 {
        let word_count = parts.len().saturating_sub(1);
        return Err(InputError::InvalidWordCount(word_count));
    }

    let (suffix, words) = parts.split_last().expect("checked length above");

    for word in words {
        if word.len() < 3 || word.len() > 8 || !word.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(InputError::MalformedPassphrase);
        }
    }

    if suffix.len() != 4
        || !suffix
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        || !suffix.bytes().any(|b| b.is_ascii_digit())
    {
        return Err(InputError::MalformedPassphrase);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_minimum_and_maximum_word_counts() {
        assert!(validate("one-two-thr-x7k3").is_ok());
        assert!(validate("one-two-thr-for-fiv-six-sev-eig-x7k3").is_ok());
    }

    #[test]
    fn rejects_too_few_or_too_many_words() {
        assert!(validate("one-two-x7k3").is_err());
        assert!(validate("one-two-thr-for-fiv-six-sev-eig-nin-x7k3").is_err());
    }

    #[test]
    fn rejects_words_shorter_than_three_chars() {
        assert!(validate("a-b-c-x7k3").is_err());
        assert!(validate("ab-acid-aged-x7k3").is_err());
    }

    #[test]
    fn rejects_suffix_without_digit() {
        assert!(validate("able-acid-aged-abcd").is_err());
    }

    #[test]
    fn rejects_urls() {
        assert!(validate("http://able-acid-aged-x7k3").is_err());
        assert!(validate("able-acid-aged-x7k3://evil").is_err());
    }

    #[test]
    fn rejects_uppercase_or_wrong_length_suffix() {
        assert!(validate("able-acid-aged-X7K3").is_err());
        assert!(validate("able-acid-aged-x7k33").is_err());
    }
}
