use super::*;
use axum::http::HeaderValue;

fn auth() -> AdminAuth {
    AdminAuth::new(Some("letmein".into()), "test-secret", 60)
}

#[test]
fn login_issues_verifiable_token() {
    let auth = auth();
    let issued = auth.login("letmein").expect("token");
    assert!(issued.expires_at > Utc::now().timestamp());
    auth.verify(&issued.token).expect("verify");

    let decoded = decode::<serde_json::Value>(
        &issued.token,
        &DecodingKey::from_secret(b"test-secret"),
        &Validation::default(),
    )
    .expect("decode");
    assert_eq!(decoded.claims["sub"], "admin");
}

#[test]
fn wrong_password_and_disabled_login_are_rejected() {
    assert!(matches!(
        auth().login("admin123"),
        Err(AuthError::InvalidPassword)
    ));
    let disabled = AdminAuth::new(None, "test-secret", 60);
    assert!(!disabled.is_enabled());
    assert!(matches!(disabled.login(""), Err(AuthError::Disabled)));
}

#[test]
fn blank_secret_disables_login_even_with_a_password() {
    for secret in ["", "   "] {
        let auth = AdminAuth::new(Some("letmein".into()), secret, 60);
        assert!(!auth.is_enabled());
        assert!(matches!(auth.login("letmein"), Err(AuthError::Disabled)));
    }
}

#[test]
fn tokens_from_another_secret_do_not_verify() {
    let issued = AdminAuth::new(Some("letmein".into()), "other-secret", 60)
        .login("letmein")
        .expect("token");
    assert!(matches!(
        auth().verify(&issued.token),
        Err(AuthError::InvalidToken(_))
    ));
}

#[test]
fn expired_tokens_do_not_verify() {
    let stale = AdminAuth::new(Some("letmein".into()), "test-secret", -3600)
        .login("letmein")
        .expect("token");
    assert!(matches!(
        auth().verify(&stale.token),
        Err(AuthError::InvalidToken(_))
    ));
}

#[test]
fn bearer_token_is_read_from_authorization_header() {
    let mut headers = HeaderMap::new();
    assert_eq!(bearer_token(&headers), None);
    assert!(matches!(
        auth().verify_headers(&headers),
        Err(AuthError::MissingToken)
    ));

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
    assert_eq!(bearer_token(&headers), Some("abc.def"));

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
    assert_eq!(bearer_token(&headers), None);
}
