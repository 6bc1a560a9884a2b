//! Customers domain module.
//!
//! Installment-credit customers, their contract lifecycle, the payments they
//! make and the witness who guarantees each contract.
//! Pure domain logic: no IO, no HTTP, no storage.

pub mod customer;
pub mod payment;
pub mod witness;

pub use customer::{
    ContactDetails, ContractStatus, Customer, CustomerImages, RegisterCustomer, UpdateProfile,
};
pub use payment::{MonthLabel, Payment, RecordPayment, UNSELECTED_MONTH};
pub use witness::{RecordWitness, UpdateWitness, Witness, WitnessDetails};
