use bannerfit_contracts::variants::ModelDiscovery;
use serde_json::Value;

use crate::transport::GenerationTransport;

/// Lists the models visible to `api_key`. Issues exactly one call and never fails.
pub fn discover_models<T: GenerationTransport + ?Sized>(
    transport: &T,
    api_key: &str,
) -> ModelDiscovery {
    match transport.list_models(api_key) {
        Ok(listing) => ModelDiscovery::Listed {
            models: model_names(&listing),
        },
        Err(err) => ModelDiscovery::Failed {
            message: err.to_string(),
        },
    }
}

fn model_names(listing: &Value) -> Vec<String> {
    listing
        .get("models")
        .and_then(Value::as_array)
        .map(|models| {
            models
                .iter()
                .filter_map(|model| model.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
