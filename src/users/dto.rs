use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub country: Option<String>,
}

/// `image: null` resets to the default avatar.
#[derive(Debug, Deserialize)]
pub struct UpdateImageRequest {
    pub image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    pub subscribed: bool,
}
