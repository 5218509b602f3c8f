use std::io::Write;

use ledgerlens_core::ProcessedReceipt;

use crate::row::ReceiptRow;
use crate::ExportError;

/// Write receipts as CSV with a header row.
pub fn write_receipts_csv<W: Write>(
    writer: W,
    receipts: &[ProcessedReceipt],
) -> Result<(), ExportError> {
    let mut w = csv::Writer::from_writer(writer);
    for p in receipts {
        w.serialize(ReceiptRow::from(p))?;
    }
    w.flush()?;
    Ok(())
}

/// CSV export as an in-memory string (the API download surface).
pub fn receipts_to_csv(receipts: &[ProcessedReceipt]) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_receipts_csv(&mut buf, receipts)?;
    String::from_utf8(buf).map_err(|e| {
        ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}
