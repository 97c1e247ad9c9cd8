use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tally::{Allocation, Allocator, MemoryCounterStore, Raised};
use tally_ledger::{CustomerId, Invoice, InvoiceBook, LedgerError};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn allocator() -> Allocator<MemoryCounterStore> {
    init_logging();
    Allocator::initialized(MemoryCounterStore::default()).unwrap()
}

fn invoice(customer: &str) -> Invoice {
    Invoice::new(CustomerId::new(customer).unwrap(), 1000)
}

fn numbers<'a, I: Iterator<Item = &'a Invoice>>(invoices: I) -> Vec<Value> {
    invoices.map(|i| i.number().clone()).collect()
}

#[test]
fn invoices_are_numbered_per_customer() {
    let allocator = allocator();
    let mut book = InvoiceBook::new(&allocator, false).unwrap();

    for customer in &["acme", "acme", "globex", "acme"] {
        book.save(&mut invoice(customer)).unwrap();
    }

    let acme = CustomerId::new("acme").unwrap();
    let globex = CustomerId::new("globex").unwrap();
    assert_eq!(numbers(book.for_customer(&acme)), vec![json!(1), json!(2), json!(3)]);
    assert_eq!(numbers(book.for_customer(&globex)), vec![json!(1)]);
    assert_eq!(book.numbering().next_count(&invoice("acme")).unwrap(), 4);
    assert_eq!(book.numbering().next_count(&invoice("initech")).unwrap(), 1);
}

#[test]
fn validating_twice_claims_one_number() {
    let allocator = allocator();
    let book = InvoiceBook::new(&allocator, false).unwrap();
    let mut draft = invoice("acme");

    assert_eq!(book.validate(&mut draft).unwrap(), Some(Allocation::Assigned(json!(1))));
    assert!(draft.is_numbered());
    assert_eq!(book.validate(&mut draft).unwrap(), None);
    assert_eq!(draft.number(), &json!(1));
    assert_eq!(book.numbering().next_count(&draft).unwrap(), 2);
}

#[test]
fn saved_invoices_keep_their_number() {
    let allocator = allocator();
    let mut book = InvoiceBook::new(&allocator, false).unwrap();
    let mut first = invoice("acme");

    let id = book.save(&mut first).unwrap();
    book.save(&mut first).unwrap();

    assert_eq!(book.len(), 1);
    assert_eq!(book.get(id).unwrap().number(), &json!(1));
    assert_eq!(book.numbering().next_count(&first).unwrap(), 2);
}

#[test]
fn supplied_numbers_are_kept_without_touching_the_counter() {
    let allocator = allocator();
    let mut book = InvoiceBook::new(&allocator, false).unwrap();

    let mut manual = invoice("acme").with_number(40);
    book.save(&mut manual).unwrap();

    assert_eq!(manual.number(), &json!(40));
    assert_eq!(book.numbering().next_count(&manual).unwrap(), 1);
}

#[test]
fn zero_is_reconciled_rather_than_replaced() {
    let allocator = allocator();
    let book = InvoiceBook::new(&allocator, false).unwrap();

    let mut blank = invoice("acme").with_number(0);
    assert_eq!(book.validate(&mut blank).unwrap(), Some(Allocation::Reconciled(Raised::NotApplied)));
    assert_eq!(blank.number(), &json!(0));
    assert!(!blank.is_numbered());
    assert_eq!(book.numbering().next_count(&blank).unwrap(), 1);
}

#[test]
fn migration_reconciles_legacy_numbers() {
    let allocator = allocator();
    let mut book = InvoiceBook::new(&allocator, true).unwrap();

    let legacy: Vec<usize> = [3, 1, 5, 2]
        .iter()
        .map(|n| book.import(invoice("acme").with_number(*n)))
        .collect();

    let mut outcomes = Vec::new();
    for id in legacy {
        let mut stored = book.get(id).unwrap().clone();
        outcomes.push(book.validate(&mut stored).unwrap());
        book.save(&mut stored).unwrap();
    }

    assert_eq!(outcomes[0], Some(Allocation::Reconciled(Raised::Updated)));
    assert_eq!(outcomes[1], Some(Allocation::Reconciled(Raised::NotApplied)));
    assert_eq!(outcomes[2], Some(Allocation::Reconciled(Raised::Updated)));
    assert_eq!(outcomes[3], Some(Allocation::Reconciled(Raised::NotApplied)));

    let mut fresh = invoice("acme");
    book.save(&mut fresh).unwrap();
    assert_eq!(fresh.number(), &json!(6));

    let mut other = invoice("globex");
    book.save(&mut other).unwrap();
    assert_eq!(other.number(), &json!(1));
}

#[test]
fn migration_rejects_numbers_beyond_the_counter_range() {
    let allocator = allocator();
    let mut book = InvoiceBook::new(&allocator, true).unwrap();
    let id = book.import(invoice("acme").with_number(u64::max_value()));

    let mut stored = book.get(id).unwrap().clone();
    let err = book.save(&mut stored).unwrap_err();
    assert!(matches!(err, LedgerError::Numbering(tally::Error::SuppliedOutOfRange { .. })));
    assert_eq!(stored.number(), &json!(u64::max_value()));
    assert_eq!(book.numbering().next_count(&stored).unwrap(), 1);
}

#[test]
fn prefixed_numbers_are_presented_but_counted_raw() {
    let allocator = allocator();
    let mut book = InvoiceBook::prefixed(&allocator, "INV-", false).unwrap();

    let mut first = invoice("acme");
    let mut second = invoice("acme");
    book.save(&mut first).unwrap();
    book.save(&mut second).unwrap();

    assert_eq!(first.number(), &json!("INV-1"));
    assert_eq!(second.number(), &json!("INV-2"));
    assert_eq!(book.numbering().next_count(&first).unwrap(), 3);
}

#[test]
fn migration_renumbers_non_numeric_numbers() {
    let allocator = allocator();
    let mut book = InvoiceBook::prefixed(&allocator, "INV-", true).unwrap();

    let mut first = invoice("acme");
    book.save(&mut first).unwrap();
    assert_eq!(first.number(), &json!("INV-1"));

    book.save(&mut first).unwrap();
    assert_eq!(first.number(), &json!("INV-2"));
}

#[test]
fn duplicate_numbers_violate_the_index() {
    let allocator = allocator();
    let mut book = InvoiceBook::new(&allocator, false).unwrap();
    book.save(&mut invoice("acme")).unwrap();

    let err = book.save(&mut invoice("acme").with_number(1)).unwrap_err();
    match err {
        LedgerError::DuplicateNumber { customer, number } => {
            assert_eq!(customer, "acme");
            assert_eq!(number, json!(1));
        }
        other => panic!("unexpected error: {}", other),
    }

    book.save(&mut invoice("globex").with_number(1)).unwrap();
    assert_eq!(book.len(), 2);
}

#[test]
fn reset_restarts_numbering_for_one_customer() {
    let allocator = allocator();
    let book = InvoiceBook::new(&allocator, false).unwrap();

    for _ in 0..3 {
        book.validate(&mut invoice("acme")).unwrap();
    }
    book.validate(&mut invoice("globex")).unwrap();

    assert_eq!(book.numbering().reset_count(&invoice("acme")).unwrap(), 1);
    assert_eq!(book.numbering().next_count(&invoice("acme")).unwrap(), 1);
    assert_eq!(book.numbering().next_count(&invoice("globex")).unwrap(), 2);
}

#[test]
fn books_require_an_initialized_allocator() {
    let allocator = Allocator::new(MemoryCounterStore::default());
    let err = InvoiceBook::new(&allocator, false).unwrap_err();
    assert!(matches!(err, LedgerError::Numbering(tally::Error::NotInitialized)));
}
