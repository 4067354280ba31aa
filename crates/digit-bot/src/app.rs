//! Application lifecycle.
//!
//! Owns the client, the statistics engine, and one strategy run:
//! connect → authorize → subscribe balance → run strategy → halt →
//! unsubscribe and disconnect.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use digit_stats::TickStatsEngine;
use digit_trader::{RunSummary, StrategyRunner};
use digit_ws::{ApiClient, ClientEvent, MemoryTokenStore, SubscriptionKey};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// How long to wait for the first session to become ready.
const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// The assembled application.
pub struct Application {
    config: AppConfig,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run one strategy session to completion.
    ///
    /// Returns `None` when interrupted before the strategy halted on its
    /// own targets.
    pub async fn run(&self) -> AppResult<Option<RunSummary>> {
        let token = self
            .config
            .api_token
            .clone()
            .or_else(|| std::env::var("DIGITBOT_TOKEN").ok())
            .ok_or_else(|| {
                AppError::Config(
                    "No API token: set api_token or the DIGITBOT_TOKEN environment variable"
                        .to_string(),
                )
            })?;

        let client = Arc::new(ApiClient::new(
            self.config.connection.to_client_config(),
            Arc::new(MemoryTokenStore::new()),
        ));

        // Supervisor task: owns the connection for the whole run.
        let mut supervisor = {
            let client = client.clone();
            tokio::spawn(async move { client.run().await })
        };

        // Event drain: the seam external persistence hangs off. The core
        // never waits on this consumer.
        let event_drain = {
            let mut events = client.events();
            tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    match event {
                        ClientEvent::Tick(sample) => {
                            trace!(symbol = %sample.symbol, quote = %sample.quote, digit = sample.last_digit, "tick")
                        }
                        ClientEvent::Balance(balance) => {
                            info!(amount = %balance.amount, currency = %balance.currency, "Balance update")
                        }
                        ClientEvent::Contract(contract) => {
                            debug!(contract_id = contract.contract_id, sold = contract.is_sold, "Contract update")
                        }
                        ClientEvent::OperationFinished { req_id, op } => {
                            trace!(req_id, %op, "Operation finished")
                        }
                    }
                }
            })
        };

        self.wait_ready(&client).await?;
        client.authorize(&token).await?;

        if let Err(e) = client.subscribe(SubscriptionKey::Balance).await {
            // Not fatal: the strategy can run without balance pushes.
            warn!(?e, "Balance subscription failed");
        }

        let stats = Arc::new(TickStatsEngine::new(self.config.stats.window_capacity));
        let runner = StrategyRunner::new(client.clone(), stats, self.config.strategy.clone());

        let summary = tokio::select! {
            result = runner.run() => Some(result?),
            // The supervisor only returns mid-run when the connection is
            // terminally lost (auth rejection, attempts exhausted).
            outcome = &mut supervisor => {
                return match outcome {
                    Ok(Ok(())) => Err(AppError::Config(
                        "Connection task stopped unexpectedly".to_string(),
                    )),
                    Ok(Err(e)) => Err(e.into()),
                    Err(e) => Err(AppError::Config(format!("Connection task panicked: {e}"))),
                };
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
                None
            }
        };

        client.unsubscribe_all().await?;
        client.disconnect();
        let _ = supervisor.await;
        event_drain.abort();

        Ok(summary)
    }

    async fn wait_ready(&self, client: &ApiClient) -> AppResult<()> {
        let ready = tokio::time::timeout(READY_TIMEOUT, async {
            while !client.is_ready() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await;
        ready.map_err(|_| {
            AppError::Config(format!(
                "Connection not ready within {}s",
                READY_TIMEOUT.as_secs()
            ))
        })
    }
}
