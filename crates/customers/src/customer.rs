use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use creditshop_core::{CustomerId, DomainError, DomainResult, Entity, UserId};

/// Contract lifecycle.
///
/// `OnContract -> OffContract` is the only transition; it happens when the
/// outstanding balance reaches exactly zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    OnContract,
    OffContract,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::OnContract => "on_contract",
            ContractStatus::OffContract => "off_contract",
        }
    }
}

impl core::fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ContractStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_contract" => Ok(ContractStatus::OnContract),
            "off_contract" => Ok(ContractStatus::OffContract),
            other => Err(DomainError::validation(format!(
                "unknown contract status: {other}"
            ))),
        }
    }
}

/// Contact fields captured at contract signing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub id_type: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub house_address: String,
    pub location: String,
    pub landmark: String,
}

impl ContactDetails {
    fn validate(&self) -> DomainResult<()> {
        if self.first_name.trim().is_empty() {
            return Err(DomainError::validation("first name cannot be empty"));
        }
        if self.last_name.trim().is_empty() {
            return Err(DomainError::validation("last name cannot be empty"));
        }
        if self.phone.trim().is_empty() {
            return Err(DomainError::validation("phone cannot be empty"));
        }
        Ok(())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

/// Already-encoded image blobs. Encoding and resizing happen outside the domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerImages {
    pub photo: Option<Vec<u8>>,
    pub id_card: Option<Vec<u8>>,
}

/// An installment-credit customer. Never hard-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: CustomerId,
    pub contact: ContactDetails,
    pub agreement: String,
    pub status: ContractStatus,
    pub months_remaining: u32,
    #[serde(default, skip_serializing)]
    pub images: CustomerImages,
    pub updated_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Command: RegisterCustomer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCustomer {
    pub customer_id: CustomerId,
    pub contact: ContactDetails,
    pub agreement: String,
    pub months: u32,
    #[serde(default)]
    pub images: CustomerImages,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateProfile.
///
/// Replaces contact fields and agreement. Images are replaced only when given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub contact: ContactDetails,
    pub agreement: String,
    pub photo: Option<Vec<u8>>,
    pub id_card: Option<Vec<u8>>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl Customer {
    /// Open a new contract. The customer starts `on_contract`.
    pub fn register(cmd: RegisterCustomer) -> DomainResult<Self> {
        cmd.contact.validate()?;

        Ok(Self {
            customer_id: cmd.customer_id,
            contact: cmd.contact,
            agreement: cmd.agreement,
            status: ContractStatus::OnContract,
            months_remaining: cmd.months,
            images: cmd.images,
            updated_by: cmd.actor,
            created_at: cmd.occurred_at,
            updated_at: cmd.occurred_at,
        })
    }

    pub fn is_on_contract(&self) -> bool {
        self.status == ContractStatus::OnContract
    }

    /// One installment was paid: `months_remaining` drops by one, floored at zero.
    pub fn record_installment(&mut self, actor: UserId, at: DateTime<Utc>) {
        self.months_remaining = self.months_remaining.saturating_sub(1);
        self.updated_by = actor;
        self.updated_at = at;
    }

    /// Apply a profile edit. Never touches `status` or `months_remaining`.
    pub fn update_profile(&mut self, cmd: UpdateProfile) -> DomainResult<()> {
        cmd.contact.validate()?;

        self.contact = cmd.contact;
        self.agreement = cmd.agreement;
        if let Some(photo) = cmd.photo {
            self.images.photo = Some(photo);
        }
        if let Some(card) = cmd.id_card {
            self.images.id_card = Some(card);
        }
        self.updated_by = cmd.actor;
        self.updated_at = cmd.occurred_at;
        Ok(())
    }

    /// Close the contract. Idempotent.
    pub fn close_contract(&mut self, actor: UserId, at: DateTime<Utc>) {
        self.status = ContractStatus::OffContract;
        self.updated_by = actor;
        self.updated_at = at;
    }
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.customer_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> ContactDetails {
        ContactDetails {
            id_type: "ghana_card".to_string(),
            first_name: "Ama".to_string(),
            last_name: "Mensah".to_string(),
            phone: "0244000000".to_string(),
            house_address: "H12".to_string(),
            location: "Kumasi".to_string(),
            landmark: "Near the market".to_string(),
        }
    }

    fn register_cmd(months: u32) -> RegisterCustomer {
        RegisterCustomer {
            customer_id: CustomerId::parse("C001").unwrap(),
            contact: contact(),
            agreement: "standard".to_string(),
            months,
            images: CustomerImages::default(),
            actor: UserId::new(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn register_starts_on_contract() {
        let customer = Customer::register(register_cmd(6)).unwrap();
        assert_eq!(customer.status, ContractStatus::OnContract);
        assert_eq!(customer.months_remaining, 6);
        assert_eq!(customer.id().as_str(), "C001");
    }

    #[test]
    fn register_rejects_empty_first_name() {
        let mut cmd = register_cmd(6);
        cmd.contact.first_name = "  ".to_string();
        assert!(matches!(
            Customer::register(cmd),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn register_rejects_empty_phone() {
        let mut cmd = register_cmd(6);
        cmd.contact.phone = String::new();
        assert!(Customer::register(cmd).is_err());
    }

    #[test]
    fn installment_floors_at_zero() {
        let mut customer = Customer::register(register_cmd(1)).unwrap();
        customer.record_installment(UserId::new(), Utc::now());
        assert_eq!(customer.months_remaining, 0);
        customer.record_installment(UserId::new(), Utc::now());
        assert_eq!(customer.months_remaining, 0);
    }

    #[test]
    fn profile_edit_keeps_contract_state() {
        let mut customer = Customer::register(register_cmd(4)).unwrap();
        customer.close_contract(UserId::new(), Utc::now());

        let mut new_contact = contact();
        new_contact.phone = "0200000000".to_string();
        customer
            .update_profile(UpdateProfile {
                contact: new_contact,
                agreement: "revised".to_string(),
                photo: Some(vec![1, 2, 3]),
                id_card: None,
                actor: UserId::new(),
                occurred_at: Utc::now(),
            })
            .unwrap();

        assert_eq!(customer.status, ContractStatus::OffContract);
        assert_eq!(customer.months_remaining, 4);
        assert_eq!(customer.contact.phone, "0200000000");
        assert_eq!(customer.images.photo.as_deref(), Some(&[1u8, 2, 3][..]));
        assert!(customer.images.id_card.is_none());
    }

    #[test]
    fn contract_status_parses_wire_names() {
        assert_eq!(
            "off_contract".parse::<ContractStatus>().unwrap(),
            ContractStatus::OffContract
        );
        assert!("closed".parse::<ContractStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&ContractStatus::OnContract).unwrap(),
            "\"on_contract\""
        );
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig { cases: 500, .. ProptestConfig::default() })]

            #[test]
            fn months_remaining_never_increases(start in 0u32..48, payments in 0usize..80) {
                let mut customer = Customer::register(register_cmd(start)).unwrap();
                let mut previous = customer.months_remaining;
                for _ in 0..payments {
                    customer.record_installment(UserId::new(), Utc::now());
                    prop_assert!(customer.months_remaining <= previous);
                    previous = customer.months_remaining;
                }
                prop_assert_eq!(customer.months_remaining, start.saturating_sub(payments as u32));
            }
        }
    }
}
