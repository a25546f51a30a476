pub mod in_memory;
pub mod postgres_route_repository;
pub mod postgres_transaction_repository;

pub use in_memory::{InMemoryRouteRepository, InMemoryTransactionRepository};
pub use postgres_route_repository::PostgresRouteRepository;
pub use postgres_transaction_repository::PostgresTransactionRepository;
