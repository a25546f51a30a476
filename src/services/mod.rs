pub mod callback;
pub mod payment_service;
pub mod route_cache;
pub mod transaction_handler;

pub use callback::{CallbackDispatcher, CallbackError, Dispatch};
pub use payment_service::{PaymentRequest, PaymentResponse, PaymentService, ServiceError};
pub use route_cache::{RouteCache, RouteError};
pub use transaction_handler::{EngineError, LifecycleEngine};
