pub mod app_config;
pub mod order_repo;

pub use app_config::Config;
pub use order_repo::InMemoryOrderRepository;
