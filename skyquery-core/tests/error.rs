use std::time::Duration;

use skyquery_core::SkyqueryError;

#[test]
fn error_display_for_llm_provider() {
    let err = SkyqueryError::LlmProvider("rate limited".to_string());
    assert_eq!(format!("{err}"), "LLM provider failed: rate limited");
}

#[test]
fn error_display_for_session_store() {
    let err = SkyqueryError::SessionStore("lock poisoned".to_string());
    assert_eq!(format!("{err}"), "Session store failed: lock poisoned");
}

#[test]
fn error_display_for_timeout() {
    let err = SkyqueryError::Timeout(Duration::from_secs(3));
    assert_eq!(format!("{err}"), "Operation timed out after 3s");
}

#[test]
fn serde_errors_convert() {
    let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
    let err: SkyqueryError = parse.unwrap_err().into();
    assert!(matches!(err, SkyqueryError::Serde(_)));
}
