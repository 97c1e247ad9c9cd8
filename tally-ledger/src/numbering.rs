use crate::domain::{is_unset, Invoice};
use log::trace;
use serde_json::Value;
use tally::{Allocation, CounterStore, Error, OutputFilter, Sequence};

/// The pre-save hook that numbers invoices.
///
/// The hook runs for an invoice that is new, has not been numbered in this lifecycle
/// and whose number is unset (null, `false`, `0` or `""`). With `migrate` set it runs
/// on every save. Either way a numeric number, `0` included, is reconciled into the
/// counter and kept, while anything else is replaced by a fresh one.
#[derive(Debug)]
pub struct InvoiceNumbering<'a, S, F> {
    sequence: Sequence<'a, S, F>,
}

impl<'a, S, F> InvoiceNumbering<'a, S, F>
where
    S: CounterStore,
    F: OutputFilter,
    F::Output: Into<Value>,
{
    /// Wraps a registered sequence.
    pub fn new(sequence: Sequence<'a, S, F>) -> Self {
        InvoiceNumbering {
            sequence,
        }
    }

    /// The registered sequence.
    pub fn sequence(&self) -> &Sequence<'a, S, F> {
        &self.sequence
    }

    /// Runs the hook against `invoice`, returning what the allocator did, if anything.
    pub fn before_save(&self, invoice: &mut Invoice) -> Result<Option<Allocation<Value>>, Error<S::Error>> {
        let config = self.sequence.config();
        let current = invoice.get(config.field());

        let eligible = invoice.is_new() && !invoice.is_numbered() && is_unset(&current);
        if !eligible && !config.migrate() {
            trace!("invoice {:?}: numbering skipped", invoice.id());
            return Ok(None);
        }

        let group = self.group_of(invoice);
        let allocation = match self.sequence.allocate(group.as_deref(), Some(&current))? {
            Allocation::Assigned(number) => {
                let number = number.into();
                invoice.assign_number(number.clone());
                Allocation::Assigned(number)
            }
            Allocation::Reconciled(raised) => Allocation::Reconciled(raised),
        };

        Ok(Some(allocation))
    }

    /// The number the next new invoice for `invoice`'s group would receive.
    pub fn next_count(&self, invoice: &Invoice) -> Result<i64, Error<S::Error>> {
        self.sequence.peek(self.group_of(invoice).as_deref())
    }

    /// Restarts numbering for `invoice`'s group.
    pub fn reset_count(&self, invoice: &Invoice) -> Result<i64, Error<S::Error>> {
        self.sequence.reset_count(self.group_of(invoice).as_deref())
    }

    fn group_of(&self, invoice: &Invoice) -> Option<String> {
        let grouping_field = self.sequence.config().grouping_field()?;
        match invoice.get(grouping_field) {
            Value::String(group) => Some(group),
            ref value if is_unset(value) => None,
            value => Some(value.to_string()),
        }
    }
}
