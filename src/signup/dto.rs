use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
}

/// Body returned for every accepted submission. New and repeated signups
/// serialize to the identical body; the response never reveals whether an
/// address was already registered.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub success: bool,
    pub message: &'static str,
}

impl SignupResponse {
    pub fn thanks() -> Self {
        Self {
            success: true,
            message: "Thank you for signing up for early access!",
        }
    }
}

/// Attribution query parameters on the signup URL.
#[derive(Debug, Default, Deserialize)]
pub struct SignupQuery {
    pub utm_campaign: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thanks_body_is_stable() {
        let body = serde_json::to_value(SignupResponse::thanks()).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Thank you for signing up for early access!");
    }

    #[test]
    fn health_body_is_stable() {
        let body = serde_json::to_value(HealthResponse { status: "OK" }).unwrap();
        assert_eq!(body, serde_json::json!({ "status": "OK" }));
    }
}
