use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use creditshop_core::{CustomerId, DomainError, DomainResult, Entity, Money, PaymentId, UserId};

/// Placeholder label the month picker submits when nothing was chosen.
pub const UNSELECTED_MONTH: &str = "The Month";

/// The month an installment pays for (free-form label, e.g. "March").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthLabel(String);

impl MonthLabel {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("month is required"));
        }
        if trimmed == UNSELECTED_MONTH {
            return Err(DomainError::validation("select the month being paid for"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MonthLabel {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MonthLabel> for String {
    fn from(value: MonthLabel) -> Self {
        value.0
    }
}

impl core::fmt::Display for MonthLabel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An installment payment. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub customer_id: CustomerId,
    pub month: MonthLabel,
    pub amount: Money,
    pub recorded_by: UserId,
    pub paid_at: DateTime<Utc>,
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPayment {
    pub customer_id: CustomerId,
    pub month: MonthLabel,
    pub amount: Money,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl Payment {
    pub fn record(cmd: RecordPayment) -> DomainResult<Self> {
        if cmd.amount <= Money::ZERO {
            return Err(DomainError::validation("payment amount must be positive"));
        }

        Ok(Self {
            id: PaymentId::new(),
            customer_id: cmd.customer_id,
            month: cmd.month,
            amount: cmd.amount,
            recorded_by: cmd.actor,
            paid_at: cmd.occurred_at,
        })
    }
}

impl Entity for Payment {
    type Id = PaymentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
