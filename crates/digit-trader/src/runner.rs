//! The automated strategy loop.
//!
//! Consumes the tick stream into the statistics engine, evaluates the
//! strategy whenever the position manager is idle, and drives opened
//! contracts to settlement. Ticks keep flowing into the window while a
//! contract is in flight; only decision-making is gated by state.

use digit_stats::TickStatsEngine;
use digit_strategy::{evaluate, Decision, StrategyConfig};
use digit_ws::{ApiClient, PushEvent, SubscriptionKey};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{TradeError, TradeResult};
use crate::manager::{HaltReason, PositionManager};

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Why the run stopped.
    pub reason: HaltReason,
    /// Signed profit over the whole run.
    pub cumulative_profit: Decimal,
    /// Contracts opened during the run.
    pub trades: u32,
}

/// Drives one strategy run over a shared client.
pub struct StrategyRunner {
    client: Arc<ApiClient>,
    stats: Arc<TickStatsEngine>,
    config: StrategyConfig,
    manager: PositionManager,
}

impl StrategyRunner {
    pub fn new(client: Arc<ApiClient>, stats: Arc<TickStatsEngine>, config: StrategyConfig) -> Self {
        let manager = PositionManager::new(config.clone());
        Self {
            client,
            stats,
            config,
            manager,
        }
    }

    /// Run until a terminal condition halts the strategy.
    pub async fn run(mut self) -> TradeResult<RunSummary> {
        let symbol = self.config.symbol.clone();
        let ticks_key = SubscriptionKey::Ticks(symbol.clone());
        let mut ticks = self.client.subscribe(ticks_key.clone()).await?;
        info!(%symbol, "Strategy run started");

        let mut contract_rx: Option<broadcast::Receiver<PushEvent>> = None;
        let mut trades = 0u32;

        let reason = loop {
            tokio::select! {
                tick = ticks.recv() => {
                    match tick {
                        Ok(PushEvent::Tick(sample)) => {
                            self.stats.on_tick(sample);
                            if !self.manager.is_idle() {
                                continue;
                            }
                            let snapshot = self.stats.stats(&symbol);
                            match evaluate(snapshot.as_ref(), &self.config, self.manager.position()) {
                                Decision::Enter { contract_type, prediction, stake } => {
                                    match self
                                        .manager
                                        .open_position(&self.client, contract_type, prediction, stake)
                                        .await
                                    {
                                        Ok(rx) => {
                                            contract_rx = Some(rx);
                                            trades += 1;
                                        }
                                        // Failures before the buy leave the
                                        // machine in Idle; the next tick
                                        // retries. Anything that leaves a
                                        // contract in flight is fatal.
                                        Err(TradeError::Ws(e))
                                            if e.is_transient() && self.manager.is_idle() =>
                                        {
                                            warn!(?e, "Entry attempt failed");
                                        }
                                        Err(e) => return Err(e),
                                    }
                                }
                                Decision::Skip(reason) => debug!(?reason, "No entry"),
                                Decision::LevelsExhausted => {
                                    self.manager.halt(HaltReason::LevelsExhausted);
                                    break HaltReason::LevelsExhausted;
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(missed = n, "Tick stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(TradeError::StreamClosed);
                        }
                    }
                }

                update = recv_push(&mut contract_rx), if contract_rx.is_some() => {
                    match update {
                        Ok(PushEvent::Contract(contract)) => {
                            if self.manager.on_contract_update(&contract).is_some() {
                                let key = SubscriptionKey::Contract(contract.contract_id);
                                contract_rx = None;
                                self.client.unsubscribe(&key).await?;
                                if let Some(reason) = self.manager.settle() {
                                    break reason;
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(missed = n, "Contract stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("Contract stream closed mid-flight, resubscribing");
                            let open = self.manager.position().open_contract;
                            match open {
                                Some(id) => {
                                    contract_rx = Some(
                                        self.client
                                            .subscribe(SubscriptionKey::Contract(id))
                                            .await?,
                                    );
                                }
                                None => contract_rx = None,
                            }
                        }
                    }
                }
            }
        };

        self.client.unsubscribe(&ticks_key).await?;
        let summary = RunSummary {
            reason,
            cumulative_profit: self.manager.position().cumulative_profit,
            trades,
        };
        info!(
            ?summary.reason,
            profit = %summary.cumulative_profit,
            trades = summary.trades,
            "Strategy run finished"
        );
        Ok(summary)
    }
}

async fn recv_push(
    rx: &mut Option<broadcast::Receiver<PushEvent>>,
) -> Result<PushEvent, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        // Guarded by `if contract_rx.is_some()`; never polled otherwise.
        None => std::future::pending().await,
    }
}
