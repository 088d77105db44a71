/// Ways a model request can fail. None of them are fatal: they are logged and
/// the viewer keeps whatever it was showing.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("Request failed: {0:#}")]
    CatalogFetch(anyhow::Error),

    #[error("Error loading model {path}: {error:#}")]
    AssetLoad { path: String, error: anyhow::Error },
}
