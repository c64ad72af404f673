use prediction_store::{PredictionError, SchemaDrift};
use std::io;

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    match PredictionError::from(io_error) {
        PredictionError::IoError(_) => {}
        other => panic!("Expected IoError variant, got {:?}", other),
    }

    let json_error = serde_json::from_str::<Vec<f64>>("[1.0,").unwrap_err();
    match PredictionError::from(json_error) {
        PredictionError::SerializationError(_) => {}
        other => panic!("Expected SerializationError variant, got {:?}", other),
    }

    let drift = SchemaDrift::single("prices", "unix_seconds", "array of integer", "null");
    match PredictionError::from(drift) {
        PredictionError::SchemaDriftError(drift) => assert!(drift.mentions("unix_seconds")),
        other => panic!("Expected SchemaDriftError variant, got {:?}", other),
    }

    let math_error = series_math::MathError::InvalidInput("empty".to_string());
    match PredictionError::from(math_error) {
        PredictionError::MathError(_) => {}
        other => panic!("Expected MathError variant, got {:?}", other),
    }
}

#[test]
fn test_error_display() {
    let error = PredictionError::DataShortageError("only 12 hours".to_string());
    assert_eq!(error.to_string(), "Data shortage: only 12 hours");

    let error = PredictionError::ConfigurationError("no planes configured".to_string());
    assert!(error.to_string().starts_with("Configuration error"));

    let error = PredictionError::TransportError("HTTP 503".to_string());
    assert!(error.to_string().contains("HTTP 503"));

    let drift = SchemaDrift::single("prices", "price[3]", "number", "\"n/a\"");
    let message = PredictionError::from(drift).to_string();
    assert!(message.contains("Field: price[3]"));
    assert!(message.contains("Expected: number"));
    assert!(message.contains("Received: \"n/a\""));
}
