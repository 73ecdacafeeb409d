use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One energy-usage increment read from a CSV feed.
///
/// Rows carry the charging session coordinates plus the increment to settle;
/// the payment session is created by the driver on first sight of a
/// `charging_session_id`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct EnergyUpdateRow {
    pub charging_session_id: String,
    pub user_id: String,
    pub station_id: String,
    pub energy_delta: Decimal,
    pub amount_xrp: Decimal,
}

/// Reads energy updates from a CSV source.
///
/// Wraps `csv::Reader` and provides an iterator over `Result<EnergyUpdateRow>`,
/// trimming whitespace and tolerating flexible record lengths.
pub struct EnergyUpdateReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EnergyUpdateReader<R> {
    /// Creates a new reader from any `Read` source (e.g. File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes updates.
    pub fn updates(self) -> impl Iterator<Item = Result<EnergyUpdateRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}
