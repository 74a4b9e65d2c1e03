pub mod whatsapp;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::types::Button;

/// Trait for the outbound messaging gateway.
///
/// The conversation engine and dispatcher only ever talk to this surface;
/// tests substitute a recording fake.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Send a plain text message.
    async fn send_text(&self, to: &str, body: &str) -> Result<(), GatewayError>;

    /// Send an image by URL with a caption.
    async fn send_image(&self, to: &str, media_url: &str, caption: &str)
        -> Result<(), GatewayError>;

    /// Send an interactive reply-button message.
    async fn send_buttons(
        &self,
        to: &str,
        body: &str,
        buttons: &[Button],
    ) -> Result<(), GatewayError>;
}
