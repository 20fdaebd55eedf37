//! Tests for error handling

use tether_core::error::{ModelError, ModelResult};
use tether_core::types::TargetPath;

#[test]
fn test_backend_failure_displays_bare_message()
{
    let error = ModelError::backend("boom");
    assert_eq!(error.to_string(), "boom");
}

#[test]
fn test_model_error_display()
{
    let gone = ModelError::ObjectGone(TargetPath::parse("Processes[7]").unwrap());
    assert_eq!(gone.to_string(), "Object is gone: Processes[7]");
    assert_eq!(ModelError::Cancelled.to_string(), "Cancelled");
    assert_eq!(ModelError::Interrupted.to_string(), "Interrupted");
    assert!(ModelError::NotFound("Sessions[3]".into()).to_string().contains("Sessions[3]"));
    assert!(ModelError::Unsupported("shutdown".into()).to_string().contains("shutdown"));
}

#[test]
fn test_error_categories()
{
    assert!(ModelError::Cancelled.is_cancellation());
    assert!(!ModelError::Interrupted.is_cancellation());
    assert!(ModelError::InvalidArgument("x".into()).is_rejection());
    assert!(ModelError::NotFound("x".into()).is_rejection());
    assert!(!ModelError::backend("x").is_rejection());
    assert!(!ModelError::Disconnected.is_rejection());
}

#[test]
fn test_result_type_alias()
{
    fn returns_ok() -> ModelResult<u32>
    {
        Ok(42)
    }

    fn returns_err() -> ModelResult<u32>
    {
        Err(ModelError::Disconnected)
    }

    assert_eq!(returns_ok().unwrap(), 42);
    assert_eq!(returns_err(), Err(ModelError::Disconnected));
}
