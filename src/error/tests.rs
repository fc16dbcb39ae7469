use super::*;
use crate::validation::ValidationError;

#[test]
fn test_error_display_includes_code() {
    let err = ObfusError::pipeline(ErrorCode::PIPELINE_NO_SUCCESS, "no technique succeeded");
    assert_eq!(
        err.to_string(),
        "[E4001] Pipeline error: no technique succeeded"
    );
}

#[test]
fn test_exit_codes() {
    assert_eq!(ObfusError::validation("bad").exit_code(), 1);
    assert_eq!(
        ObfusError::environment(ErrorCode::ENV_DECLINED, "declined").exit_code(),
        1
    );
    assert_eq!(
        ObfusError::pipeline(ErrorCode::PIPELINE_INTERRUPTED, "ctrl-c").exit_code(),
        130
    );
}

#[test]
fn test_presentation_errors_are_not_fatal() {
    let err = ObfusError::presentation(ErrorCode::PRESENTATION_CLIPBOARD, "no xclip");
    assert!(!err.is_fatal());
    assert!(ObfusError::config_with_code(ErrorCode::CONFIG_PARSE_ERROR, "bad toml").is_fatal());
}

#[test]
fn test_with_context_and_source() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err = ObfusError::other("could not create workspace")
        .with_context("/tmp/ObfusWorkspace")
        .with_source(io);

    assert_eq!(err.code(), ErrorCode::OTHER_GENERIC);
    assert!(err.to_string().contains("/tmp/ObfusWorkspace"));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_from_validation_error_keeps_field() {
    let err: ObfusError = ValidationError::InvalidIp("999.999.999.999".to_string()).into();
    assert_eq!(err.code(), ErrorCode::VALIDATION_IP);
    assert!(err.user_message().starts_with("Invalid ip address"));
}

#[test]
fn test_error_ext_to_presentation_error() {
    let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "xclip missing",
    ));
    let err = result
        .to_presentation_error(ErrorCode::PRESENTATION_CLIPBOARD, "clipboard copy failed")
        .unwrap_err();
    assert!(!err.is_fatal());
    assert!(err.to_string().contains("xclip missing"));
}

#[test]
fn test_describe_error_code() {
    assert_eq!(describe_error_code(ErrorCode::VALIDATION_IP), "Invalid IP address literal");
    assert_eq!(describe_error_code(1999), "Validation error");
    assert_eq!(describe_error_code(ErrorCode::PIPELINE_INTERRUPTED), "Run interrupted");
    assert_eq!(describe_error_code(12), "Unknown error");
}
