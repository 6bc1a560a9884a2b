use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use creditshop_core::{CustomerId, DomainError, DomainResult, Entity, UserId};

/// Guarantor named on a customer's contract. At most one per customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub customer_id: CustomerId,
    pub details: WitnessDetails,
    #[serde(default, skip_serializing)]
    pub image: Option<Vec<u8>>,
    pub recorded_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessDetails {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    /// Terms the witness agreed to, as written on the form.
    pub terms: String,
}

impl WitnessDetails {
    fn validate(&self) -> DomainResult<()> {
        for (field, value) in [
            ("first name", &self.first_name),
            ("last name", &self.last_name),
            ("phone", &self.phone),
            ("terms", &self.terms),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::validation(format!("{field} cannot be empty")));
            }
        }
        Ok(())
    }
}

/// Command: RecordWitness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordWitness {
    pub customer_id: CustomerId,
    pub details: WitnessDetails,
    #[serde(default)]
    pub image: Option<Vec<u8>>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateWitness. The image is replaced only when given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateWitness {
    pub details: WitnessDetails,
    #[serde(default)]
    pub image: Option<Vec<u8>>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl Witness {
    pub fn record(cmd: RecordWitness) -> DomainResult<Self> {
        cmd.details.validate()?;

        Ok(Self {
            customer_id: cmd.customer_id,
            details: cmd.details,
            image: cmd.image,
            recorded_by: cmd.actor,
            created_at: cmd.occurred_at,
            updated_at: cmd.occurred_at,
        })
    }

    pub fn update(&mut self, cmd: UpdateWitness) -> DomainResult<()> {
        cmd.details.validate()?;

        self.details = cmd.details;
        if let Some(image) = cmd.image {
            self.image = Some(image);
        }
        self.recorded_by = cmd.actor;
        self.updated_at = cmd.occurred_at;
        Ok(())
    }
}

impl Entity for Witness {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.customer_id
    }
}
