//! Request composition: template + user text + payload → [`InferenceRequest`].

use crate::pipeline::normalize::NormalizedImagePayload;
use crate::prompts::compose_prompt;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// The unit sent to the hosted model: one prompt, one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRequest {
    pub prompt: String,
    pub image: NormalizedImagePayload,
}

impl InferenceRequest {
    /// Image bytes as standard base64, the form every vision API embeds in JSON.
    pub fn image_base64(&self) -> String {
        STANDARD.encode(&self.image.data)
    }
}

/// Pair the composed prompt with the normalized image. Pure and infallible.
pub fn compose_request(
    template: &str,
    user_text: &str,
    image: NormalizedImagePayload,
) -> InferenceRequest {
    InferenceRequest {
        prompt: compose_prompt(template, user_text),
        image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> NormalizedImagePayload {
        NormalizedImagePayload {
            mime_type: "image/jpeg".into(),
            data: vec![0xFF, 0xD8, 0xFF, 0xD9],
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn identical_inputs_give_identical_requests() {
        let a = compose_request("T", "no nuts", payload());
        let b = compose_request("T", "no nuts", payload());
        assert_eq!(a, b);
        assert_eq!(a.prompt.as_bytes(), b.prompt.as_bytes());
    }

    #[test]
    fn payload_is_carried_unchanged() {
        let r = compose_request("T", "", payload());
        assert_eq!(r.image, payload());
        assert_eq!(r.prompt, "T ");
    }

    #[test]
    fn image_base64_round_trips() {
        let r = compose_request("T", "", payload());
        assert_eq!(STANDARD.decode(r.image_base64()).unwrap(), payload().data);
    }
}
