//! Enrollment flow: update verification methods.

use anyhow::Result;

pub async fn execute(subject: String, base_url: Option<String>) -> Result<()> {
    super::run_session(subject, base_url, true).await
}
