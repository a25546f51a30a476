pub mod route;
pub mod transaction;

pub use route::{Channel, Gateway, Route};
pub use transaction::{
    Customer, PaymentData, PaymentObject, Transaction, TxnError, TxnKind, TxnStatus,
    CALLBACK_INFO_KEY,
};
