pub mod model_loading;
pub mod validation;
