use financify_core::{hash_password_with_cost, verify_password};

const COST: u32 = 4;

#[test]
fn test_hash_password_success() {
    let password = "gophers";
    let hash = hash_password_with_cost(password, COST).unwrap();

    assert!(!hash.is_empty());
    assert_ne!(hash, password);
    assert!(hash.starts_with("$2"));
}

#[test]
fn test_hash_is_salted() {
    let first = hash_password_with_cost("gophers", COST).unwrap();
    let second = hash_password_with_cost("gophers", COST).unwrap();

    assert_ne!(first, second);
    assert!(verify_password("gophers", &first).unwrap());
    assert!(verify_password("gophers", &second).unwrap());
}

#[test]
fn test_verify_password_incorrect() {
    let hash = hash_password_with_cost("correctpassword", COST).unwrap();

    assert!(!verify_password("wrongpassword", &hash).unwrap());
    assert!(!verify_password("", &hash).unwrap());
}

#[test]
fn test_verify_password_unicode() {
    let password = "pässwörd-🔑";
    let hash = hash_password_with_cost(password, COST).unwrap();

    assert!(verify_password(password, &hash).unwrap());
    assert!(!verify_password("passwort-🔑", &hash).unwrap());
}

#[test]
fn test_verify_against_malformed_hash_is_error() {
    assert!(verify_password("gophers", "not-a-bcrypt-hash").is_err());
}
