//! The `test-connection` command.

use anyhow::{anyhow, Result};
use clap::Parser;
use termcolor::Color;

use super::{build_service, print_status, TargetArgs, REQUEST_TIMEOUT};

/// Sends a small probe request to check credentials.
#[derive(Parser)]
pub struct TestConnectionCommand {
    /// Provider and model selection.
    #[command(flatten)]
    pub target: TargetArgs,
}

impl TestConnectionCommand {
    /// Executes the connection test.
    pub async fn execute(self) -> Result<()> {
        let registry = self.target.registry()?;
        let settings = self.target.settings(&registry)?;
        let label = format!("{}/{}", settings.provider, settings.model);

        let service = build_service(registry)?;
        let status = tokio::time::timeout(REQUEST_TIMEOUT, service.test_connection(&settings))
            .await
            .map_err(|_| anyhow!("Connection test timed out after {}s", REQUEST_TIMEOUT.as_secs()))?;

        match status.error {
            None => {
                print_status(Color::Green, &format!("Connection to {label} succeeded"))?;
                Ok(())
            }
            Some(error) => Err(anyhow!("Connection to {label} failed: {error}")),
        }
    }
}
