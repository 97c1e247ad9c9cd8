//! # tally-ledger
//!
//! An example domain built on `tally`: invoices numbered per customer.
//!
//! Saving an [Invoice] through an [InvoiceBook] runs the numbering hook, which
//! claims the customer's next invoice number for new, unnumbered invoices. A book
//! opened with `migrate` reconciles numbers that legacy invoices already carry.

#![warn(
    unused_import_braces,
    unused_imports,
    unused_qualifications,
    missing_docs,
)]

#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use,
)]

mod book;
pub mod domain;
pub mod error;
mod numbering;

pub use crate::book::{numbering_options, InvoiceBook, MODEL};
pub use crate::domain::{CustomerId, Invoice, NumberPrefix};
pub use crate::error::{InvalidCustomer, LedgerError};
pub use crate::numbering::InvoiceNumbering;
