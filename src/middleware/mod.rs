pub mod callback_source;
pub mod request_logger;
