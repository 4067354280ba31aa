//! Position manager state machine.
//!
//! Idle → AwaitingProposal → AwaitingBuy → Open → Settling → (Idle | Halted).
//! Back-pressure is expressed through state: while the machine is not
//! Idle, new decisions are not acted on, which guarantees at most one
//! open contract per run.

use digit_core::{Contract, ContractType};
use digit_strategy::{PositionState, StrategyConfig};
use digit_ws::{
    ApiClient, BuyInfo, Payload, ProposalInfo, ProposalParams, PushEvent, SubscriptionKey,
    WsRequest,
};
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{TradeError, TradeResult};

/// Extra proposal attempts after the first transient failure.
const PROPOSAL_RETRIES: u32 = 2;
/// Spacing between proposal attempts.
const PROPOSAL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Terminal condition that ended a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// Cumulative profit reached the target.
    TargetProfitReached,
    /// Cumulative loss reached the stop.
    StopLossReached,
    /// The consecutive-loss ceiling was hit.
    LevelsExhausted,
}

/// Where the machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradePhase {
    Idle,
    AwaitingProposal,
    AwaitingBuy,
    Open,
    Settling,
    Halted(HaltReason),
}

/// Turns decisions into proposal/buy calls and tracks the open contract
/// to settlement.
pub struct PositionManager {
    config: StrategyConfig,
    phase: TradePhase,
    position: PositionState,
}

impl PositionManager {
    pub fn new(config: StrategyConfig) -> Self {
        let position = PositionState::new(config.initial_stake);
        Self {
            config,
            phase: TradePhase::Idle,
            position,
        }
    }

    pub fn phase(&self) -> TradePhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == TradePhase::Idle
    }

    pub fn position(&self) -> &PositionState {
        &self.position
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        match self.phase {
            TradePhase::Halted(reason) => Some(reason),
            _ => None,
        }
    }

    /// Force the machine into a terminal state.
    pub fn halt(&mut self, reason: HaltReason) {
        info!(?reason, profit = %self.position.cumulative_profit, "Run halted");
        self.phase = TradePhase::Halted(reason);
        self.position.halted = true;
    }

    /// Act on an entering decision: price a proposal, buy at the quoted
    /// price, and subscribe to the contract's updates.
    ///
    /// Returns the contract update stream. On failure before the buy the
    /// machine returns to Idle so the next decision can try again.
    pub async fn open_position(
        &mut self,
        client: &ApiClient,
        contract_type: ContractType,
        prediction: Option<u8>,
        stake: Decimal,
    ) -> TradeResult<broadcast::Receiver<PushEvent>> {
        if !self.is_idle() {
            return Err(TradeError::NotIdle);
        }

        self.phase = TradePhase::AwaitingProposal;
        let params = ProposalParams {
            amount: stake,
            contract_type,
            currency: self.config.currency.clone(),
            duration: self.config.duration_ticks,
            symbol: self.config.symbol.clone(),
            barrier: prediction.filter(|_| contract_type.takes_barrier()),
        };

        let proposal = match self.request_proposal(client, &params).await {
            Ok(proposal) => proposal,
            Err(e) => {
                self.phase = TradePhase::Idle;
                return Err(e);
            }
        };
        debug!(proposal_id = %proposal.id, ask = %proposal.ask_price, "Proposal priced");

        self.phase = TradePhase::AwaitingBuy;
        let buy = match self.request_buy(client, &proposal).await {
            Ok(buy) => buy,
            Err(e) => {
                self.phase = TradePhase::Idle;
                return Err(e);
            }
        };
        info!(
            contract_id = buy.contract_id,
            price = %buy.buy_price,
            stake = %stake,
            "Contract opened"
        );

        // The stake only becomes "previous" for escalation once it is
        // actually in play; a failed proposal must not move it.
        self.position.current_stake = stake;
        self.position.open_contract = Some(buy.contract_id);
        let updates = client
            .subscribe(SubscriptionKey::Contract(buy.contract_id))
            .await?;
        self.phase = TradePhase::Open;
        Ok(updates)
    }

    async fn request_proposal(
        &self,
        client: &ApiClient,
        params: &ProposalParams,
    ) -> TradeResult<ProposalInfo> {
        let mut attempt = 0u32;
        loop {
            match client.call(WsRequest::proposal(params)).await {
                Ok(frame) => match frame.payload {
                    Some(Payload::Proposal { proposal }) => return Ok(proposal),
                    _ => return Err(TradeError::UnexpectedResponse("proposal")),
                },
                Err(e) if e.is_transient() && attempt < PROPOSAL_RETRIES => {
                    attempt += 1;
                    warn!(attempt, ?e, "Proposal failed, retrying");
                    tokio::time::sleep(PROPOSAL_RETRY_DELAY).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn request_buy(&self, client: &ApiClient, proposal: &ProposalInfo) -> TradeResult<BuyInfo> {
        let frame = client
            .call(WsRequest::buy(&proposal.id, proposal.ask_price))
            .await?;
        match frame.payload {
            Some(Payload::Buy { buy }) => Ok(buy),
            _ => Err(TradeError::UnexpectedResponse("buy")),
        }
    }

    /// Fold a contract update into the machine.
    ///
    /// Updates for other contracts or before the sold flag are ignored.
    /// Returns the signed profit once the open contract settles; the
    /// machine is then in Settling and `settle` must be called.
    pub fn on_contract_update(&mut self, contract: &Contract) -> Option<Decimal> {
        if self.phase != TradePhase::Open {
            return None;
        }
        if self.position.open_contract != Some(contract.contract_id) {
            debug!(
                contract_id = contract.contract_id,
                "Update for foreign contract ignored"
            );
            return None;
        }
        if !contract.is_sold {
            return None;
        }

        let profit = contract.profit;
        self.position.record_settlement(profit);
        self.phase = TradePhase::Settling;
        info!(
            contract_id = contract.contract_id,
            profit = %profit,
            cumulative = %self.position.cumulative_profit,
            losses = self.position.consecutive_losses,
            "Contract settled"
        );
        Some(profit)
    }

    /// Evaluate termination after a settlement.
    ///
    /// Returns the halt reason when the run must stop; otherwise the
    /// machine returns to Idle, ready for the next decision.
    pub fn settle(&mut self) -> Option<HaltReason> {
        let reason = if self.position.cumulative_profit >= self.config.target_profit {
            Some(HaltReason::TargetProfitReached)
        } else if self.position.cumulative_profit <= -self.config.stop_loss {
            Some(HaltReason::StopLossReached)
        } else if self.config.max_martingale_level > 0
            && self.position.consecutive_losses >= self.config.max_martingale_level
        {
            Some(HaltReason::LevelsExhausted)
        } else {
            None
        };

        match reason {
            Some(reason) => self.halt(reason),
            None => self.phase = TradePhase::Idle,
        }
        reason
    }
}
