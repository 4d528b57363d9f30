use atlana::core::crypt::{adjust_passcode, adjust_salt, Crypt, KEY_LENGTHS, SALT_LENGTH};

#[test]
fn salt_is_always_sixteen_characters() {
    for input in ["", "a", "exactly-16-chars", "definitely longer than sixteen characters"] {
        assert_eq!(adjust_salt(input).chars().count(), SALT_LENGTH);
    }
}

#[test]
fn short_salt_pads_with_dashes() {
    assert_eq!(adjust_salt("abc"), "abc-------------");
}

#[test]
fn long_salt_truncates() {
    assert_eq!(adjust_salt("0123456789abcdefXYZ"), "0123456789abcdef");
}

#[test]
fn passcode_lands_on_an_accepted_length() {
    for length in 0..40 {
        let passcode = "p".repeat(length);
        let adjusted = adjust_passcode(&passcode);
        assert!(
            KEY_LENGTHS.contains(&adjusted.chars().count()),
            "length {} adjusted to {}",
            length,
            adjusted.len()
        );
    }
}

#[test]
fn passcode_pads_with_dots_to_next_length() {
    assert_eq!(adjust_passcode("seventeen-chars!!").len(), 24);
    assert!(adjust_passcode("seventeen-chars!!").ends_with("......."));
}

#[test]
fn passcode_truncates_past_maximum() {
    let long = "x".repeat(100);
    assert_eq!(adjust_passcode(&long), "x".repeat(32));
}

#[test]
fn roundtrip_across_key_sizes_and_plaintext_lengths() {
    let crypt = Crypt::new("roundtrip-salt");
    let passcodes = ["k".repeat(16), "k".repeat(24), "k".repeat(32)];
    for passcode in &passcodes {
        for length in [0usize, 1, 15, 16, 17, 255, 1024, 5000] {
            let plaintext = "t".repeat(length);
            let cipher = crypt.encrypt(&plaintext, passcode).unwrap();
            assert_eq!(crypt.decrypt(&cipher, passcode).unwrap(), plaintext);
        }
    }
}

#[test]
fn unadjusted_passcodes_roundtrip_too() {
    let crypt = Crypt::new("salt");
    let cipher = crypt.encrypt("credentials", "tiny").unwrap();
    assert_eq!(crypt.decrypt(&cipher, "tiny").unwrap(), "credentials");
}

#[test]
fn ciphertext_is_base64_text() {
    let crypt = Crypt::new("salt");
    let cipher = crypt.encrypt("some text", "passcode").unwrap();
    assert!(cipher
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '='));
}

#[test]
fn fixed_iv_means_deterministic_ciphertext() {
    let crypt = Crypt::new("process-wide-iv");
    assert_eq!(
        crypt.encrypt("same text", "same passcode").unwrap(),
        crypt.encrypt("same text", "same passcode").unwrap()
    );
}

#[test]
fn different_salts_change_the_ciphertext() {
    let first = Crypt::new("salt-one").encrypt("text", "passcode").unwrap();
    let second = Crypt::new("salt-two").encrypt("text", "passcode").unwrap();
    assert_ne!(first, second);
}

#[test]
fn malformed_input_is_a_decryption_error() {
    let crypt = Crypt::new("salt");
    assert!(crypt.decrypt("@@not-base64@@", "passcode").is_err());
}

#[test]
fn value_roundtrip_preserves_structure() {
    let crypt = Crypt::new("salt");
    let auth = serde_json::json!({"user": "u", "password": "p", "port": 1247});
    let cipher = crypt.encrypt_value(&auth, "s3cret12345678901").unwrap();
    let recovered = crypt.decrypt_value(&cipher, "s3cret12345678901").unwrap();
    assert_eq!(recovered, auth);
}
