pub mod emergency;

/// Health check — verifies the backend is up
pub fn health_check() -> String {
    tracing::debug!("Health check called");
    "ok".to_string()
}
