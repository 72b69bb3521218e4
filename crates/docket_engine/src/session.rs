use engine_logging::engine_info;

use crate::automation::{bounded, Automation, CredentialBundle};
use crate::config::TimingConfig;
use crate::EngineError;

/// Authenticate once for the whole run. Any failure here is run-fatal.
pub async fn open_session(
    automation: &dyn Automation,
    timing: &TimingConfig,
) -> Result<CredentialBundle, EngineError> {
    engine_info!("Opening portal session");
    bounded("login", timing.login_timeout(), automation.new_session())
        .await
        .map_err(|err| {
            if err.is_fatal() {
                EngineError::Fatal(err)
            } else {
                EngineError::Login(err)
            }
        })
}
