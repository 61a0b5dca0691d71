use serde_json::Value;
use tracing::warn;

use crate::storage::StorageRoot;

/// Loads an analysis data file. Absence, unreadable content and invalid
/// JSON all yield `None`; only the latter two are worth a warning.
pub async fn load_saliency_data(storage: &StorageRoot, data_path: &str) -> Option<Value> {
    let path = storage.resolve_existing(data_path).await?;
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Could not read saliency data file {}: {e}", path.display());
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Saliency data file {} is not valid JSON: {e}", path.display());
            None
        }
    }
}
