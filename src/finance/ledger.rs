// In-memory ledger and its reducer

use rust_decimal::Decimal;
use tracing::debug;

use crate::finance::models::{LedgerField, LedgerRow, TransactionType, TypeBreakdown};

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    kind: TransactionType,
    amount: Decimal,
    fees: Decimal,
    commission: Decimal,
    net: Decimal,
}

impl Entry {
    fn field(&self, field: LedgerField) -> Decimal {
        match field {
            LedgerField::Amount => self.amount,
            LedgerField::Fees => self.fees,
            LedgerField::Commission => self.commission,
            LedgerField::Net => self.net,
        }
    }
}

/// Ledger rows for one period, with types parsed and nulls read as zero
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    entries: Vec<Entry>,
    unrecognized: usize,
}

impl Ledger {
    /// Rows with a type outside the known set are counted but never summed
    pub fn from_rows(rows: Vec<LedgerRow>) -> Self {
        let mut ledger = Ledger::default();

        for row in rows {
            match row.transaction_type.parse::<TransactionType>() {
                Ok(kind) => ledger.entries.push(Entry {
                    kind,
                    amount: row.amount.unwrap_or_default(),
                    fees: row.fees.unwrap_or_default(),
                    commission: row.commission.unwrap_or_default(),
                    net: row.net.unwrap_or_default(),
                }),
                Err(e) => {
                    debug!("Ignoring ledger row: {}", e);
                    ledger.unrecognized += 1;
                }
            }
        }

        ledger
    }

    /// Sum `field` over rows whose type is in `types`
    pub fn sum(&self, types: &[TransactionType], field: LedgerField) -> Decimal {
        self.entries
            .iter()
            .filter(|e| types.contains(&e.kind))
            .map(|e| e.field(field))
            .sum()
    }

    /// Number of rows read, recognized or not
    pub fn len(&self) -> usize {
        self.entries.len() + self.unrecognized
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Totals per type present in the ledger, in declaration order
    pub fn breakdown(&self) -> Vec<TypeBreakdown> {
        TransactionType::ALL
            .into_iter()
            .filter_map(|kind| {
                let count = self.entries.iter().filter(|e| e.kind == kind).count();
                (count > 0).then(|| TypeBreakdown {
                    transaction_type: kind,
                    count,
                    amount: self.sum(&[kind], LedgerField::Amount),
                    fees: self.sum(&[kind], LedgerField::Fees),
                    commission: self.sum(&[kind], LedgerField::Commission),
                    net: self.sum(&[kind], LedgerField::Net),
                })
            })
            .collect()
    }
}
