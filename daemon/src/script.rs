//! Scripted sale simulation.
//!
//! A script is a TOML list of `[[step]]` tables replayed in order against a
//! fresh ledger. Time comes from a [`NullClock`]: each step may pin the clock
//! with `at`, and `advance` steps move it forward. A failing step is recorded
//! and the replay continues, as it would against a live sale.

use anyhow::Context;
use crowdsale_ledger::{AccountEntry, PurchaseRequest, SaleSummary, StageSnapshot};
use crowdsale_nullables::NullClock;
use crowdsale_service::SaleService;
use crowdsale_types::{AccountId, Timestamp, TokenAmount, Wei};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Clone, Debug, Deserialize)]
pub struct Script {
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Step {
    /// Absolute time to set before running the step.
    #[serde(default)]
    pub at: Option<Timestamp>,
    #[serde(flatten)]
    pub op: Op,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Advance {
        secs: u64,
    },
    Purchase {
        payer: AccountId,
        amount: Wei,
        #[serde(default)]
        beneficiary: Option<AccountId>,
        #[serde(default)]
        referrer: Option<AccountId>,
    },
    SetRate {
        caller: AccountId,
        rate: u64,
    },
    SetHardCap {
        caller: AccountId,
        hard_cap: Wei,
    },
    SetPioneerTimeEnd {
        caller: AccountId,
        pioneer_time_end: Timestamp,
    },
    SetMinTokensPurchased {
        caller: AccountId,
        min_tokens_purchased: TokenAmount,
    },
    Pause {
        caller: AccountId,
    },
    Unpause {
        caller: AccountId,
    },
    Withdraw {
        caller: AccountId,
        amount: Wei,
    },
    WithdrawAll {
        caller: AccountId,
    },
}

impl Op {
    fn name(&self) -> &'static str {
        match self {
            Self::Advance { .. } => "advance",
            Self::Purchase { .. } => "purchase",
            Self::SetRate { .. } => "set_rate",
            Self::SetHardCap { .. } => "set_hard_cap",
            Self::SetPioneerTimeEnd { .. } => "set_pioneer_time_end",
            Self::SetMinTokensPurchased { .. } => "set_min_tokens_purchased",
            Self::Pause { .. } => "pause",
            Self::Unpause { .. } => "unpause",
            Self::Withdraw { .. } => "withdraw",
            Self::WithdrawAll { .. } => "withdraw_all",
        }
    }
}

impl Script {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("invalid simulation script")
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::from_toml_str(&content)
    }
}

/// How one step went.
#[derive(Clone, Debug, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub op: &'static str,
    pub at: Timestamp,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

/// Everything a simulation prints.
#[derive(Clone, Debug, Serialize)]
pub struct SimulationReport {
    pub steps: Vec<StepOutcome>,
    pub summary: SaleSummary,
    pub accounts: BTreeMap<AccountId, AccountEntry>,
    pub stages: Vec<StageSnapshot>,
}

async fn apply(service: &SaleService<NullClock>, clock: &NullClock, op: &Op) -> anyhow::Result<serde_json::Value> {
    let event = match op {
        Op::Advance { secs } => {
            clock.advance(*secs);
            return to_json(&serde_json::json!({ "now": clock_now(clock) }));
        }
        Op::Purchase {
            payer,
            amount,
            beneficiary,
            referrer,
        } => {
            let mut request = PurchaseRequest::new(*payer, *amount);
            if let Some(beneficiary) = beneficiary {
                request = request.on_behalf_of(*beneficiary);
            }
            if let Some(referrer) = referrer {
                request = request.referred_by(*referrer);
            }
            let receipt = service.purchase(request).await?;
            return to_json(&receipt);
        }
        Op::SetRate { caller, rate } => service.set_rate(*caller, *rate).await?,
        Op::SetHardCap { caller, hard_cap } => service.set_hard_cap(*caller, *hard_cap).await?,
        Op::SetPioneerTimeEnd {
            caller,
            pioneer_time_end,
        } => service.set_pioneer_time_end(*caller, *pioneer_time_end).await?,
        Op::SetMinTokensPurchased {
            caller,
            min_tokens_purchased,
        } => {
            service
                .set_min_tokens_purchased(*caller, *min_tokens_purchased)
                .await?
        }
        Op::Pause { caller } => service.pause(*caller).await?,
        Op::Unpause { caller } => service.unpause(*caller).await?,
        Op::Withdraw { caller, amount } => service.withdraw(*caller, *amount).await?,
        Op::WithdrawAll { caller } => service.withdraw_all(*caller).await?,
    };
    to_json(&event)
}

fn clock_now(clock: &NullClock) -> Timestamp {
    use crowdsale_types::Clock;
    clock.now()
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<serde_json::Value> {
    serde_json::to_value(value).context("failed to encode step result")
}

/// Replay `script` step by step and report the final ledger.
pub async fn run(service: &SaleService<NullClock>, clock: &NullClock, script: &Script) -> SimulationReport {
    let mut steps = Vec::with_capacity(script.steps.len());
    for (index, step) in script.steps.iter().enumerate() {
        if let Some(at) = step.at {
            clock.set(at.as_secs());
        }
        let at = clock_now(clock);
        let outcome = match apply(service, clock, &step.op).await {
            Ok(detail) => StepOutcome {
                index,
                op: step.op.name(),
                at,
                ok: true,
                error: None,
                detail: Some(detail),
            },
            Err(e) => {
                tracing::debug!(index, op = step.op.name(), error = %e, "step failed");
                StepOutcome {
                    index,
                    op: step.op.name(),
                    at,
                    ok: false,
                    error: Some(e.to_string()),
                    detail: None,
                }
            }
        };
        steps.push(outcome);
    }

    service
        .read(|engine| SimulationReport {
            steps,
            summary: engine.summary(),
            accounts: engine.accounts().map(|(id, entry)| (*id, entry.clone())).collect(),
            stages: engine.closed_stages().to_vec(),
        })
        .await
}
