//! Domain-level constants shared across crates.

/// Access tokens are refreshed once `now` passes `expires_at` minus this.
pub const TOKEN_REFRESH_WINDOW_SECS: i64 = 300;

/// Items requested per ERP catalog page.
pub const ERP_PAGE_SIZE: usize = 200;
/// Upper bound on pages fetched in one catalog listing.
pub const ERP_MAX_PAGES: usize = 100;

pub const QUOTATION_NUMBER_PREFIX: &str = "QT";
pub const ORDER_NUMBER_PREFIX: &str = "SO";
pub const PAY_LATER_TRAN_REF_PREFIX: &str = "BNPL";
pub const TRAN_REF_PREFIX: &str = "TRN";

// Batch processing defaults
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

// Webhook event types written to the ledger
pub const EVENT_PAYMENT_CALLBACK: &str = "payment.callback";
pub const EVENT_PAYMENT_RETURN: &str = "payment.return";
