//! Verification Code Delivery
//!
//! SMS delivery is handled outside this service. [`LoggingCodeSender`] stands
//! in for it by writing the code to the log.

use async_trait::async_trait;
use tracing::info;

use crate::application::services::CodeSender;
use crate::shared::error::AppError;

#[derive(Debug, Clone, Default)]
pub struct LoggingCodeSender;

#[async_trait]
impl CodeSender for LoggingCodeSender {
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), AppError> {
        info!(phone = %phone, code = %code, "Verification code issued");
        Ok(())
    }
}
