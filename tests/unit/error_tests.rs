//! Unit tests for `AppError` display and conversions.

use pair_bridge::AppError;

#[test]
fn display_prefixes_each_variant() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Transport("bad".into()), "transport: bad"),
        (AppError::Protocol("bad".into()), "protocol: bad"),
        (AppError::Engine("bad".into()), "engine: bad"),
        (AppError::PathViolation("bad".into()), "path violation: bad"),
        (AppError::Edit("bad".into()), "edit: bad"),
        (AppError::InvalidInput("bad".into()), "invalid input: bad"),
        (AppError::Io("bad".into()), "io: bad"),
        (AppError::Disconnected("bad".into()), "disconnected: bad"),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn toml_error_maps_to_config() {
    let err = toml::from_str::<toml::Value>("= nope").expect_err("invalid toml");
    let app: AppError = err.into();
    match app {
        AppError::Config(msg) => assert!(msg.starts_with("invalid config: "), "{msg}"),
        other => panic!("expected Config, got {other:?}"),
    }
}

#[test]
fn json_error_maps_to_protocol() {
    let err = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
    assert!(matches!(AppError::from(err), AppError::Protocol(_)));
}

#[test]
fn io_error_maps_to_io() {
    let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let app = AppError::from(err);
    assert!(matches!(app, AppError::Io(ref msg) if msg == "gone"));
}

#[test]
fn app_error_is_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    assert_error(&AppError::Engine("x".into()));
}
