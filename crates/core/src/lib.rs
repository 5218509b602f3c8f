pub mod money;
pub mod receipt;

pub use money::{Money, MoneyParseError};
pub use receipt::{
    ExtractedField, LineItem, PaymentMethod, ProcessedReceipt, Receipt, ReceiptStatus,
};
