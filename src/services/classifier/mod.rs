pub mod fake;
pub mod inference;
pub mod interface;
pub mod model_manager;
