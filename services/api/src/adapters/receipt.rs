//! services/api/src/adapters/receipt.rs
//!
//! Renders printable pickup receipts as standalone HTML pages with `askama`.
//! Every interpolated value goes through askama's HTML escaping.

use askama::Template;
use async_trait::async_trait;
use resource_board_core::ports::{PortError, PortResult, ReceiptRenderingService};
use resource_board_core::Receipt;

#[derive(Template)]
#[template(path = "receipt.html")]
struct ReceiptTemplate<'a> {
    helper_name: &'a str,
    helper_phone: &'a str,
    needer_name: &'a str,
    resource: &'a str,
    timestamp: String,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlReceiptAdapter;

impl HtmlReceiptAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReceiptRenderingService for HtmlReceiptAdapter {
    async fn render_receipt(&self, receipt: &Receipt) -> PortResult<String> {
        let page = ReceiptTemplate {
            helper_name: &receipt.helper_name,
            helper_phone: &receipt.helper_phone,
            needer_name: &receipt.needer_name,
            resource: &receipt.resource,
            timestamp: receipt.timestamp.format("%Y-%m-%d %H:%M UTC").to_string(),
        };
        page.render()
            .map_err(|e| PortError::Unexpected(format!("failed to render receipt: {e}")))
    }
}
