use doc_store::{Collection, DocumentStore, Record, StoreError};

use crate::error::DomainError;
use crate::retry::note_retry;

use super::{FinancialYear, Invoice, InvoiceError, NewInvoice};

/// Attempts at finding a free auto-generated number before giving up.
///
/// Collisions only happen when a caller-supplied number took a value the
/// counter had not reached yet.
pub const MAX_NUMBERING_ATTEMPTS: u32 = 10;

/// Hands out invoice numbers and records invoices.
///
/// Numbers come from an atomic per-year counter in the store, so concurrent
/// callers never see the same number and numbers are never reused, even
/// after an invoice is deleted.
#[derive(Clone)]
pub struct InvoiceSequencer<S> {
    invoices: Collection<S, Invoice>,
}

fn format_number(year: &FinancialYear, seq: i64) -> String {
    format!("Y{}{:03}", year.short_code(), seq)
}

impl<S: DocumentStore> InvoiceSequencer<S> {
    pub fn new(store: S) -> Self {
        Self {
            invoices: Collection::new(store),
        }
    }

    /// Claims the next number for `year`, e.g. `Y24001`.
    #[tracing::instrument(skip(self), fields(year = %year))]
    pub async fn next_number(&self, year: &FinancialYear) -> Result<String, DomainError> {
        let seq = self
            .invoices
            .store()
            .next_in_sequence(&year.counter_name())
            .await?;
        Ok(format_number(year, seq))
    }

    /// The number the next claim would return, without claiming it.
    pub async fn preview_number(&self, year: &FinancialYear) -> Result<String, DomainError> {
        let last = self
            .invoices
            .store()
            .peek_sequence(&year.counter_name())
            .await?;
        Ok(format_number(year, last + 1))
    }

    /// Validates, prices and stores an invoice.
    ///
    /// Auto-generated numbers skip over values already taken; a
    /// caller-supplied number that is taken fails with
    /// `DuplicateInvoiceNumber`.
    #[tracing::instrument(skip(self, input), fields(wholesaler = %input.wholesaler_ref))]
    pub async fn record_invoice(&self, input: NewInvoice) -> Result<Record<Invoice>, DomainError> {
        let year = input.financial_year();

        if !input.auto_generate {
            let number = input
                .invoice_number
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| {
                    InvoiceError::InvalidInvoice(
                        "invoiceNumber is required unless autoGenerate is set".to_string(),
                    )
                })?
                .to_string();
            let invoice = input.price(number.clone())?;

            return match self.invoices.insert(invoice).await {
                Ok(record) => Ok(self.recorded(record)),
                Err(StoreError::DuplicateKey { .. }) => {
                    Err(InvoiceError::DuplicateInvoiceNumber(number).into())
                }
                Err(e) => Err(e.into()),
            };
        }

        // Validate before claiming so a bad request does not burn a number
        input.price(String::new())?;

        for attempt in 1..=MAX_NUMBERING_ATTEMPTS {
            let number = self.next_number(&year).await?;
            let invoice = input.price(number.clone())?;

            match self.invoices.insert(invoice).await {
                Ok(record) => return Ok(self.recorded(record)),
                Err(StoreError::DuplicateKey { .. }) => {
                    tracing::warn!(number = %number, "generated invoice number already taken");
                    note_retry("invoice.record", attempt);
                }
                Err(e) => {
                    tracing::warn!(
                        number = %number,
                        error = %e,
                        "claimed invoice number left unused"
                    );
                    return Err(e.into());
                }
            }
        }

        Err(DomainError::ContentionExhausted {
            operation: "invoice.record",
            attempts: MAX_NUMBERING_ATTEMPTS,
        })
    }

    fn recorded(&self, record: Record<Invoice>) -> Record<Invoice> {
        metrics::counter!("invoices_recorded_total").increment(1);
        tracing::info!(
            number = %record.data.invoice_number,
            total = %record.data.total_amount,
            "invoice recorded"
        );
        record
    }

    pub async fn get(&self, number: &str) -> Result<Record<Invoice>, DomainError> {
        self.invoices
            .find_by_key(number.trim())
            .await?
            .ok_or_else(|| InvoiceError::InvoiceNotFound(number.trim().to_string()).into())
    }

    /// Invoices of one financial year, or all of them, oldest first.
    pub async fn list(
        &self,
        year: Option<&FinancialYear>,
    ) -> Result<Vec<Record<Invoice>>, DomainError> {
        let invoices = match year {
            Some(year) => self.invoices.list_partition(&year.to_string()).await?,
            None => self.invoices.list_all().await?,
        };
        Ok(invoices)
    }

    /// Deletes an invoice. Its number is not handed out again.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, number: &str) -> Result<(), DomainError> {
        let record = self.get(number).await?;
        if self.invoices.delete(record.id).await? {
            tracing::info!(number, "invoice deleted");
            Ok(())
        } else {
            Err(InvoiceError::InvoiceNotFound(number.trim().to_string()).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use common::RecordId;
    use doc_store::{
        DocumentQuery, InMemoryDocumentStore, NewDocument, StoredDocument, WriteOptions,
    };

    use super::*;
    use crate::ErrorKind;
    use crate::money::{Money, Percentage};

    /// Counters work, every insert times out.
    #[derive(Clone, Default)]
    struct InsertFailsStore {
        inner: InMemoryDocumentStore,
    }

    #[async_trait]
    impl DocumentStore for InsertFailsStore {
        async fn insert(&self, _doc: NewDocument) -> doc_store::Result<StoredDocument> {
            Err(StoreError::Timeout {
                operation: "insert",
                after: Duration::from_millis(5),
            })
        }
        async fn get(&self, c: &str, id: RecordId) -> doc_store::Result<Option<StoredDocument>> {
            self.inner.get(c, id).await
        }
        async fn find_by_key(&self, c: &str, k: &str) -> doc_store::Result<Option<StoredDocument>> {
            self.inner.find_by_key(c, k).await
        }
        async fn list(&self, q: DocumentQuery) -> doc_store::Result<Vec<StoredDocument>> {
            self.inner.list(q).await
        }
        async fn replace(
            &self,
            c: &str,
            id: RecordId,
            b: serde_json::Value,
            o: WriteOptions,
        ) -> doc_store::Result<StoredDocument> {
            self.inner.replace(c, id, b, o).await
        }
        async fn delete(&self, c: &str, id: RecordId, o: WriteOptions) -> doc_store::Result<bool> {
            self.inner.delete(c, id, o).await
        }
        async fn delete_partition(&self, c: &str, p: &str) -> doc_store::Result<u64> {
            self.inner.delete_partition(c, p).await
        }
        async fn next_in_sequence(&self, c: &str) -> doc_store::Result<i64> {
            self.inner.next_in_sequence(c).await
        }
        async fn peek_sequence(&self, c: &str) -> doc_store::Result<i64> {
            self.inner.peek_sequence(c).await
        }
    }
    fn sequencer() -> InvoiceSequencer<InMemoryDocumentStore> {
        InvoiceSequencer::new(InMemoryDocumentStore::new())
    }

    fn fy() -> FinancialYear {
        "2024-2025".parse().unwrap()
    }

    fn input(number: Option<&str>) -> NewInvoice {
        NewInvoice {
            invoice_number: number.map(str::to_string),
            wholesaler_ref: "WHL-1".to_string(),
            purchase_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            gross_amount: Money::from_major(10_000),
            gst_percentage: Percentage::from_percent(18),
            other_cost: Money::from_major(200),
            discount: Money::from_major(300),
            financial_year: None,
            auto_generate: number.is_none(),
        }
    }

    #[tokio::test]
    async fn numbers_are_sequential_per_year() {
        let seq = sequencer();
        assert_eq!(seq.preview_number(&fy()).await.unwrap(), "Y24001");
        assert_eq!(seq.next_number(&fy()).await.unwrap(), "Y24001");
        assert_eq!(seq.next_number(&fy()).await.unwrap(), "Y24002");
        assert_eq!(seq.preview_number(&fy()).await.unwrap(), "Y24003");
        assert_eq!(
            seq.next_number(&FinancialYear::starting(2025)).await.unwrap(),
            "Y25001"
        );
    }

    #[tokio::test]
    async fn auto_numbered_invoice_gets_totals() {
        let seq = sequencer();
        let invoice = seq.record_invoice(input(None)).await.unwrap();

        assert_eq!(invoice.data.invoice_number, "Y24001");
        assert_eq!(invoice.data.total_amount, Money::from_major(11_700));
        assert_eq!(seq.list(Some(&fy())).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_insert_after_claim_leaves_a_gap() {
        let seq = InvoiceSequencer::new(InsertFailsStore::default());

        let err = seq.record_invoice(input(None)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
        assert_eq!(seq.preview_number(&fy()).await.unwrap(), "Y24002");
        assert!(seq.list(Some(&fy())).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_manual_number_is_rejected() {
        let seq = sequencer();
        seq.record_invoice(input(Some("INV-9"))).await.unwrap();

        let dup = seq.record_invoice(input(Some("INV-9"))).await;
        assert!(matches!(
            dup,
            Err(DomainError::Invoice(InvoiceError::DuplicateInvoiceNumber(n))) if n == "INV-9"
        ));
    }

    #[tokio::test]
    async fn manual_mode_requires_a_number() {
        let mut missing = input(None);
        missing.auto_generate = false;
        assert!(matches!(
            sequencer().record_invoice(missing).await,
            Err(DomainError::Invoice(InvoiceError::InvalidInvoice(_)))
        ));
    }

    #[tokio::test]
    async fn auto_numbering_skips_manually_taken_numbers() {
        let seq = sequencer();
        seq.record_invoice(input(Some("Y24001"))).await.unwrap();

        let invoice = seq.record_invoice(input(None)).await.unwrap();
        assert_eq!(invoice.data.invoice_number, "Y24002");
    }

    #[tokio::test]
    async fn invalid_input_does_not_burn_a_number() {
        let seq = sequencer();
        let mut bad = input(None);
        bad.discount = Money::from_major(1_000_000);

        assert!(seq.record_invoice(bad).await.is_err());
        assert_eq!(seq.preview_number(&fy()).await.unwrap(), "Y24001");
    }

    #[tokio::test]
    async fn deleted_numbers_are_not_reused() {
        let seq = sequencer();
        let first = seq.record_invoice(input(None)).await.unwrap();
        seq.delete(&first.data.invoice_number).await.unwrap();

        assert!(matches!(
            seq.get("Y24001").await,
            Err(DomainError::Invoice(InvoiceError::InvoiceNotFound(_)))
        ));
        let second = seq.record_invoice(input(None)).await.unwrap();
        assert_eq!(second.data.invoice_number, "Y24002");
        assert!(seq.delete("Y24001").await.is_err());
    }
}
