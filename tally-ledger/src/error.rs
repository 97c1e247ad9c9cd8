//! Error types for the ledger domain.

use serde_json::Value;
use std::{error, fmt};
use tally::StoreError;

/// The provided customer identifier is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvalidCustomer;

impl error::Error for InvalidCustomer {}

impl fmt::Display for InvalidCustomer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("customer identifier cannot be empty")
    }
}

/// A ledger operation failed.
#[derive(Debug)]
pub enum LedgerError<E> {
    /// Numbering the invoice failed.
    Numbering(tally::Error<E>),

    /// Another saved invoice already carries this number for the customer.
    DuplicateNumber {
        /// The customer the collision was found for.
        customer: String,

        /// The colliding invoice number.
        number: Value,
    },

    /// No saved invoice has this identifier.
    UnknownInvoice(usize),
}

impl<E> From<tally::Error<E>> for LedgerError<E> {
    fn from(err: tally::Error<E>) -> Self {
        LedgerError::Numbering(err)
    }
}

impl<E: fmt::Display> fmt::Display for LedgerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            LedgerError::Numbering(ref e) => write!(f, "invoice numbering failed: {}", e),
            LedgerError::DuplicateNumber { ref customer, ref number } => {
                write!(f, "customer {} already has an invoice numbered {}", customer, number)
            }
            LedgerError::UnknownInvoice(id) => write!(f, "no invoice with id {}", id),
        }
    }
}

impl<E: StoreError> error::Error for LedgerError<E> {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            LedgerError::Numbering(ref e) => Some(e),
            _ => None,
        }
    }
}
