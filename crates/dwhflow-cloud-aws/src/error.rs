//! SDK error conversion

use aws_sdk_ec2::error::DisplayErrorContext;
use dwhflow_cloud::CloudError;

/// Wrap an SDK failure, keeping the full source chain in the message
pub(crate) fn sdk_error<E>(operation: &str, err: E) -> CloudError
where
    E: std::error::Error,
{
    CloudError::api(operation, DisplayErrorContext(err))
}

/// A successful response that lacks the field we need
pub(crate) fn missing_field(operation: &str, field: &str) -> CloudError {
    CloudError::api(operation, format!("response has no {}", field))
}
