use presence_sync::AppError;

#[test]
fn display_prefixes_each_kind() {
    assert_eq!(
        AppError::StoreUnavailable("timeout".into()).to_string(),
        "store unavailable: timeout"
    );
    assert_eq!(AppError::NoActiveSession.to_string(), "no active session");
    assert_eq!(
        AppError::InvalidInput("blank".into()).to_string(),
        "invalid input: blank"
    );
    assert_eq!(AppError::Config("bad".into()).to_string(), "config: bad");
    assert_eq!(AppError::Io("closed".into()).to_string(), "io: closed");
}

#[test]
fn messages_have_no_trailing_period() {
    let errors = [
        AppError::StoreUnavailable("write failed".into()),
        AppError::NoActiveSession,
        AppError::InvalidInput("message text is empty".into()),
    ];
    for err in errors {
        let s = err.to_string();
        assert!(!s.ends_with('.'), "error message must not end with a period: {s}");
    }
}

#[test]
fn soft_rejections_are_local_kinds_only() {
    assert!(AppError::NoActiveSession.is_soft_rejection());
    assert!(AppError::InvalidInput("x".into()).is_soft_rejection());
    assert!(!AppError::StoreUnavailable("x".into()).is_soft_rejection());
    assert!(!AppError::Config("x".into()).is_soft_rejection());
    assert!(!AppError::Io("x".into()).is_soft_rejection());
}

#[test]
fn io_error_converts() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err = AppError::from(io);
    assert!(matches!(err, AppError::Io(msg) if msg.contains("pipe closed")));
}

#[test]
fn implements_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    let err = AppError::NoActiveSession;
    assert_error(&err);
    assert!(format!("{err:?}").contains("NoActiveSession"));
}
