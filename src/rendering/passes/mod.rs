pub mod model_pass;
