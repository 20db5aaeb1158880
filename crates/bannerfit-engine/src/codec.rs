use bannerfit_contracts::image::SourceImage;
use bannerfit_contracts::ratios::AspectRatio;
use serde_json::{json, Value};

/// Output resolution requested for every variant.
pub const IMAGE_SIZE_TIER: &str = "2K";

/// Builds the `generateContent` body for one ratio.
pub fn encode(source: &SourceImage, prompt: &str, ratio: &AspectRatio) -> Value {
    json!({
        "contents": [
            {
                "parts": [
                    { "text": prompt },
                    {
                        "inlineData": {
                            "mimeType": source.mime_type,
                            "data": source.base64_data,
                        }
                    }
                ]
            }
        ],
        "generationConfig": {
            "imageConfig": {
                "aspectRatio": ratio.as_str(),
                "imageSize": IMAGE_SIZE_TIER,
            }
        }
    })
}
