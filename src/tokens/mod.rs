pub mod manager;

pub use manager::TokenLifecycleManager;
