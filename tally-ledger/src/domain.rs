//! Invoices and the values they are made of.

use crate::error::InvalidCustomer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use tally::OutputFilter;

/// The customer an invoice is billed to. Invoice numbers are sequenced per customer.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId {
    id: String,
}

impl CustomerId {
    /// Creates a new customer identifier, verifying that it is not empty.
    pub fn new<S: Into<String>>(id: S) -> Result<CustomerId, InvalidCustomer> {
        let id = id.into();
        if id.is_empty() {
            Err(InvalidCustomer)
        } else {
            Ok(CustomerId {
                id,
            })
        }
    }

    /// Provides access to the identifier as a `&str`.
    pub fn as_str(&self) -> &str {
        self.id.borrow()
    }
}

impl Borrow<str> for CustomerId {
    fn borrow(&self) -> &str {
        self.id.borrow()
    }
}

/// Presents invoice numbers with a fixed prefix, e.g. `INV-7`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberPrefix(pub String);

impl OutputFilter for NumberPrefix {
    type Output = String;

    fn apply(&self, raw: i64) -> String {
        format!("{}{}", self.0, raw)
    }
}

/// An invoice record.
///
/// `number` is a dynamic attribute: it holds whatever the numbering assigned (a raw
/// count or a prefixed string) or whatever a legacy import carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    id: Option<usize>,
    customer: CustomerId,
    amount_cents: i64,
    #[serde(default)]
    number: Value,
    #[serde(skip)]
    persisted: bool,
    #[serde(skip)]
    numbered: bool,
}

impl Invoice {
    /// A new, unsaved and unnumbered invoice.
    pub fn new(customer: CustomerId, amount_cents: i64) -> Self {
        Invoice {
            id: None,
            customer,
            amount_cents,
            number: Value::Null,
            persisted: false,
            numbered: false,
        }
    }

    /// A new invoice that already carries a number.
    pub fn with_number<V: Into<Value>>(mut self, number: V) -> Self {
        self.number = number.into();
        self
    }

    /// The identifier assigned when the invoice was first saved.
    pub fn id(&self) -> Option<usize> {
        self.id
    }

    /// The billed customer.
    pub fn customer(&self) -> &CustomerId {
        &self.customer
    }

    /// The billed amount.
    pub fn amount_cents(&self) -> i64 {
        self.amount_cents
    }

    /// The invoice number, `Null` until one is assigned.
    pub fn number(&self) -> &Value {
        &self.number
    }

    /// Whether the invoice has never been saved.
    pub fn is_new(&self) -> bool {
        !self.persisted
    }

    /// Whether a number was assigned to this in-memory invoice.
    pub fn is_numbered(&self) -> bool {
        self.numbered
    }

    /// Reads an attribute by name. Unknown attributes read as `Null`.
    pub fn get(&self, attribute: &str) -> Value {
        match attribute {
            "_id" => self.id.map_or(Value::Null, Value::from),
            "customer" => Value::from(self.customer.as_str()),
            "amountCents" => Value::from(self.amount_cents),
            "number" => self.number.clone(),
            _ => Value::Null,
        }
    }

    pub(crate) fn assign_number(&mut self, number: Value) {
        self.number = number;
        self.numbered = true;
    }

    pub(crate) fn mark_saved(&mut self, id: usize) {
        self.id = Some(id);
        self.persisted = true;
    }
}

/// Whether an attribute value counts as not set: null, `false`, zero or the empty string.
pub fn is_unset(value: &Value) -> bool {
    match *value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(ref n) => n.as_f64() == Some(0.0),
        Value::String(ref s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}
