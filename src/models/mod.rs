pub mod payment;

// Re-export commonly used types so other modules can use `crate::models::X`
pub use payment::{
    ApiResponse, CreateSubpayeeRequest, PaymentSession, ProviderTxRequest, Quote, SessionStatus,
    SubpayeeCreated, TxParams,
};
