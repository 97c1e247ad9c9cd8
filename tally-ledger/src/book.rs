use crate::{
    domain::{CustomerId, Invoice, NumberPrefix},
    error::LedgerError,
    numbering::InvoiceNumbering,
};
use log::debug;
use serde_json::Value;
use tally::{Allocation, Allocator, CounterStore, FieldOptions, Identity, OutputFilter, OwnerIndex};

/// The model name invoices are counted under.
pub const MODEL: &str = "Invoice";

/// Numbering options for invoices: `number`, grouped by `customer`, starting at 1.
pub fn numbering_options(migrate: bool) -> FieldOptions {
    FieldOptions::new(MODEL)
        .with_field("number")
        .with_grouping_field("customer")
        .with_start_at(1)
        .with_migrate(migrate)
}

/// An in-memory collection of invoices that numbers them as they are saved and
/// enforces the numbering index.
#[derive(Debug)]
pub struct InvoiceBook<'a, S, F = Identity> {
    numbering: InvoiceNumbering<'a, S, F>,
    index: OwnerIndex,
    invoices: Vec<Invoice>,
}

impl<'a, S> InvoiceBook<'a, S, Identity>
where
    S: CounterStore,
{
    /// A book presenting raw invoice numbers.
    pub fn new(allocator: &'a Allocator<S>, migrate: bool) -> Result<Self, LedgerError<S::Error>> {
        let sequence = allocator.register(numbering_options(migrate))?;
        Ok(InvoiceBook::with_numbering(InvoiceNumbering::new(sequence)))
    }
}

impl<'a, S> InvoiceBook<'a, S, NumberPrefix>
where
    S: CounterStore,
{
    /// A book presenting invoice numbers with a prefix, e.g. `INV-1`.
    pub fn prefixed<P: Into<String>>(allocator: &'a Allocator<S>, prefix: P, migrate: bool) -> Result<Self, LedgerError<S::Error>> {
        let sequence = allocator.register_with_filter(numbering_options(migrate), NumberPrefix(prefix.into()))?;
        Ok(InvoiceBook::with_numbering(InvoiceNumbering::new(sequence)))
    }
}

impl<'a, S, F> InvoiceBook<'a, S, F>
where
    S: CounterStore,
    F: OutputFilter,
    F::Output: Into<Value>,
{
    /// A book over an existing numbering hook.
    pub fn with_numbering(numbering: InvoiceNumbering<'a, S, F>) -> Self {
        let index = numbering.sequence().config().index();
        InvoiceBook {
            numbering,
            index,
            invoices: Vec::new(),
        }
    }

    /// The numbering hook.
    pub fn numbering(&self) -> &InvoiceNumbering<'a, S, F> {
        &self.numbering
    }

    /// Runs the pre-save hook without storing the invoice.
    pub fn validate(&self, invoice: &mut Invoice) -> Result<Option<Allocation<Value>>, LedgerError<S::Error>> {
        Ok(self.numbering.before_save(invoice)?)
    }

    /// Numbers the invoice if needed, checks the index and stores it.
    ///
    /// New invoices are appended and receive an id; saved ones replace their
    /// previous version. A number claimed before an index violation is not returned
    /// to the sequence.
    pub fn save(&mut self, invoice: &mut Invoice) -> Result<usize, LedgerError<S::Error>> {
        if let Some(id) = invoice.id() {
            if id >= self.invoices.len() {
                return Err(LedgerError::UnknownInvoice(id));
            }
        }

        self.validate(invoice)?;
        self.check_index(invoice)?;

        let id = match invoice.id() {
            Some(id) => id,
            None => self.invoices.len(),
        };
        invoice.mark_saved(id);

        if id == self.invoices.len() {
            self.invoices.push(invoice.clone());
        } else {
            self.invoices[id] = invoice.clone();
        }

        debug!(
            "invoice {}: saved; customer: {}, number: {}, amount_cents: {}",
            id,
            invoice.customer().as_str(),
            invoice.number(),
            invoice.amount_cents(),
        );
        Ok(id)
    }

    /// Stores an invoice as given, bypassing the hook. For loading legacy data.
    pub fn import(&mut self, mut invoice: Invoice) -> usize {
        let id = self.invoices.len();
        invoice.mark_saved(id);
        self.invoices.push(invoice);
        id
    }

    /// A saved invoice.
    pub fn get(&self, id: usize) -> Option<&Invoice> {
        self.invoices.get(id)
    }

    /// Every saved invoice of a customer.
    pub fn for_customer<'b>(&'b self, customer: &'b CustomerId) -> impl Iterator<Item = &'b Invoice> + 'b {
        self.invoices.iter().filter(move |invoice| invoice.customer() == customer)
    }

    /// The number of saved invoices.
    pub fn len(&self) -> usize {
        self.invoices.len()
    }

    /// Whether no invoice has been saved.
    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty()
    }

    fn check_index(&self, invoice: &Invoice) -> Result<(), LedgerError<S::Error>> {
        if !self.index.unique {
            return Ok(());
        }

        let entry = self.index_entry(invoice);
        let collides = self
            .invoices
            .iter()
            .filter(|other| other.id() != invoice.id())
            .any(|other| self.index_entry(other) == entry);

        if collides {
            Err(LedgerError::DuplicateNumber {
                customer: invoice.customer().as_str().to_owned(),
                number: invoice.number().clone(),
            })
        } else {
            Ok(())
        }
    }

    fn index_entry(&self, invoice: &Invoice) -> Vec<Value> {
        self.index.fields.iter().map(|field| invoice.get(field)).collect()
    }
}
