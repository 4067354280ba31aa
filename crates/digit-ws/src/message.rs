//! Wire message types.
//!
//! Outbound commands are JSON objects with a numeric `req_id` attached by
//! the correlator. Inbound frames echo `req_id` and carry either a
//! `msg_type`-tagged payload or an `error` object; they are decoded once
//! here at the transport boundary.

use digit_core::{Balance, Contract, ContractStatus, ContractType, TickSample};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{WsError, WsResult};

// ============================================================================
// Outbound commands
// ============================================================================

/// Parameters for a priced proposal request.
#[derive(Debug, Clone)]
pub struct ProposalParams {
    /// Stake amount.
    pub amount: Decimal,
    /// Contract type to price.
    pub contract_type: ContractType,
    /// Account currency.
    pub currency: String,
    /// Contract duration in ticks.
    pub duration: u32,
    /// Underlying symbol.
    pub symbol: String,
    /// Digit barrier, for types that take one.
    pub barrier: Option<u8>,
}

/// Builders for outbound command objects.
pub struct WsRequest;

impl WsRequest {
    /// Attach a correlation id to a command object.
    pub fn attach_req_id(mut command: Value, req_id: u64) -> Value {
        if let Some(obj) = command.as_object_mut() {
            obj.insert("req_id".to_string(), json!(req_id));
        }
        command
    }

    pub fn authorize(token: &str) -> Value {
        json!({ "authorize": token })
    }

    pub fn ping() -> Value {
        json!({ "ping": 1 })
    }

    pub fn ticks(symbol: &str) -> Value {
        json!({ "ticks": symbol, "subscribe": 1 })
    }

    pub fn balance() -> Value {
        json!({ "balance": 1, "subscribe": 1 })
    }

    pub fn open_contract(contract_id: u64) -> Value {
        json!({
            "proposal_open_contract": 1,
            "contract_id": contract_id,
            "subscribe": 1
        })
    }

    pub fn proposal(params: &ProposalParams) -> Value {
        let mut cmd = json!({
            "proposal": 1,
            "amount": params.amount,
            "basis": "stake",
            "contract_type": params.contract_type.as_str(),
            "currency": params.currency,
            "duration": params.duration,
            "duration_unit": "t",
            "symbol": params.symbol,
        });
        if let Some(digit) = params.barrier {
            cmd.as_object_mut()
                .expect("proposal command is an object")
                .insert("barrier".to_string(), json!(digit.to_string()));
        }
        cmd
    }

    pub fn buy(proposal_id: &str, price: Decimal) -> Value {
        json!({ "buy": proposal_id, "price": price })
    }

    pub fn forget(stream_id: &str) -> Value {
        json!({ "forget": stream_id })
    }

    pub fn forget_all() -> Value {
        json!({ "forget_all": ["ticks", "proposal_open_contract", "balance"] })
    }
}

// ============================================================================
// Inbound frames
// ============================================================================

/// Upstream stream identity attached to subscription frames.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionInfo {
    pub id: String,
}

/// Brokerage-reported error object.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiFault {
    pub code: String,
    pub message: String,
}

/// Authorization acknowledgment.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeInfo {
    #[serde(default)]
    pub loginid: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub balance: Option<Decimal>,
}

/// A pushed tick quote.
#[derive(Debug, Clone, Deserialize)]
pub struct TickQuote {
    #[serde(default)]
    pub id: Option<String>,
    pub symbol: String,
    pub quote: Decimal,
    pub epoch: i64,
    #[serde(default = "default_pip_size")]
    pub pip_size: u32,
}

fn default_pip_size() -> u32 {
    2
}

impl TickQuote {
    /// Convert to a domain sample, deriving the last digit.
    pub fn to_sample(&self) -> TickSample {
        TickSample::new(self.symbol.clone(), self.quote, self.pip_size, self.epoch)
    }
}

/// A priced proposal acknowledgment.
#[derive(Debug, Clone, Deserialize)]
pub struct ProposalInfo {
    pub id: String,
    pub ask_price: Decimal,
    #[serde(default)]
    pub payout: Option<Decimal>,
    #[serde(default)]
    pub spot: Option<Decimal>,
}

/// A buy acknowledgment.
#[derive(Debug, Clone, Deserialize)]
pub struct BuyInfo {
    pub contract_id: u64,
    pub buy_price: Decimal,
    #[serde(default)]
    pub transaction_id: Option<u64>,
    #[serde(default)]
    pub longcode: Option<String>,
}

/// An open-contract update.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractInfo {
    pub contract_id: u64,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_sold: Option<u8>,
    #[serde(default)]
    pub profit: Option<Decimal>,
    #[serde(default)]
    pub buy_price: Option<Decimal>,
    #[serde(default)]
    pub barrier: Option<String>,
    #[serde(default)]
    pub underlying: Option<String>,
    #[serde(default)]
    pub entry_tick: Option<Decimal>,
    #[serde(default)]
    pub exit_tick: Option<Decimal>,
}

impl ContractInfo {
    /// Convert to the domain contract type.
    pub fn to_contract(&self) -> Contract {
        let status = match self.status.as_deref() {
            Some("won") => ContractStatus::Won,
            Some("lost") => ContractStatus::Lost,
            Some("sold") => ContractStatus::Sold,
            Some("cancelled") => ContractStatus::Cancelled,
            _ => ContractStatus::Open,
        };
        Contract {
            contract_id: self.contract_id,
            contract_type: self
                .contract_type
                .as_deref()
                .and_then(|s| s.parse::<ContractType>().ok()),
            buy_price: self.buy_price.unwrap_or_default(),
            symbol: self.underlying.clone().unwrap_or_default(),
            barrier: self.barrier.as_deref().and_then(|b| b.parse().ok()),
            status,
            profit: self.profit.unwrap_or_default(),
            entry_spot: self.entry_tick,
            exit_spot: self.exit_tick,
            is_sold: self.is_sold.unwrap_or(0) != 0,
        }
    }
}

/// A balance update.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceInfo {
    pub balance: Decimal,
    pub currency: String,
    #[serde(default)]
    pub loginid: Option<String>,
}

impl BalanceInfo {
    pub fn to_balance(&self) -> Balance {
        Balance {
            amount: self.balance,
            currency: self.currency.clone(),
        }
    }
}

/// Command-specific payload, tagged by `msg_type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "msg_type", rename_all = "snake_case")]
pub enum Payload {
    Authorize { authorize: AuthorizeInfo },
    Tick { tick: TickQuote },
    Proposal { proposal: ProposalInfo },
    Buy { buy: BuyInfo },
    ProposalOpenContract { proposal_open_contract: ContractInfo },
    Balance { balance: BalanceInfo },
    Forget { forget: Value },
    ForgetAll { forget_all: Value },
    Ping { ping: String },
}

impl Payload {
    /// Wire name of the command this payload answers.
    pub fn msg_type(&self) -> &'static str {
        match self {
            Self::Authorize { .. } => "authorize",
            Self::Tick { .. } => "tick",
            Self::Proposal { .. } => "proposal",
            Self::Buy { .. } => "buy",
            Self::ProposalOpenContract { .. } => "proposal_open_contract",
            Self::Balance { .. } => "balance",
            Self::Forget { .. } => "forget",
            Self::ForgetAll { .. } => "forget_all",
            Self::Ping { .. } => "ping",
        }
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    /// Correlation id echoed from the originating command.
    pub req_id: Option<u64>,
    /// Upstream stream identity, present on subscription frames.
    pub subscription: Option<SubscriptionInfo>,
    /// Brokerage-reported error; payload is absent when set.
    pub error: Option<ApiFault>,
    /// Decoded payload; `None` for unrecognized message types.
    pub payload: Option<Payload>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    req_id: Option<u64>,
    #[serde(default)]
    subscription: Option<SubscriptionInfo>,
    #[serde(default)]
    error: Option<ApiFault>,
}

/// Decode an inbound text frame.
///
/// Non-JSON input is a protocol fault. A JSON object with an unknown
/// `msg_type` decodes with `payload: None` so the connection stays up.
pub fn decode_frame(text: &str) -> WsResult<InboundFrame> {
    let value: Value = serde_json::from_str(text)?;
    let envelope = Envelope::deserialize(&value)
        .map_err(|e| WsError::Protocol(format!("bad frame envelope: {e}")))?;
    let payload = if envelope.error.is_none() {
        Payload::deserialize(&value).ok()
    } else {
        None
    };
    Ok(InboundFrame {
        req_id: envelope.req_id,
        subscription: envelope.subscription,
        error: envelope.error,
        payload,
    })
}
