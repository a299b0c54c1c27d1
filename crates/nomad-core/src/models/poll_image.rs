use serde::{Deserialize, Serialize};

/// Response body of a successful poll-option image upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollImageResponse {
    pub image_url: String,
    pub storage_path: String,
    pub mime_type: String,
    pub file_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_camel_case() {
        let response = PollImageResponse {
            image_url: "/v1/wallet/files/abc".to_string(),
            storage_path: "poll-images/t/u/1_beach.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            file_size: 42,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["imageUrl"], "/v1/wallet/files/abc");
        assert_eq!(json["storagePath"], "poll-images/t/u/1_beach.jpg");
        assert_eq!(json["mimeType"], "image/jpeg");
        assert_eq!(json["fileSize"], 42);
    }
}
