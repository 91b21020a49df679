use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::OpenAiConfig;

/// Fixed extraction instruction. The model infers the category per item since
/// the receipt itself carries none.
pub const EXTRACTION_INSTRUCTIONS: &str = r#"
I will provide you with the HTML content of a grocery store receipt.
All prices are in Bulgarian Lev (BGN).
Product items are usually in Bulgarian language.
Product items are displayed as HTML span elements with class "purchase_list_line_N".
Sometimes, there can be multiple span elements with the same class for a single product (e.g., for quantity and price). Those can be grouped by the "data-art-id" HTML attribute.

Your task is to analyze the receipt and extract the following information in JSON format:
	- date: Date of purchase (format: DD-MM-YYYY)
	- time: Time of purchase (format: HH:MM)
	- total: Total amount paid
	- items: List of items purchased, each with:
		- name: Name
		- quantity: Quantity
		- category: Category (e.g. "Dairy", "Bakery", "Beverages", etc. This info will not be part of the receipt, you will need to infer it based on the product name. If you can't guess, leave it empty)
		- price_per_unit: Price per unit"#;

/// Seam for the inference capability so tests can inject a probe instead of a
/// live endpoint.
#[async_trait]
pub trait ReceiptExtractor: Send + Sync {
    /// Submits one reduced receipt fragment and returns the model's raw text
    /// reply. The reply is persisted as-is, without schema validation.
    async fn extract(&self, fragment: &str) -> anyhow::Result<String>;
}

pub struct OpenAiExtractor {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiExtractor {
    pub fn new(config: &OpenAiConfig) -> Self {
        OpenAiExtractor {
            client: Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl ReceiptExtractor for OpenAiExtractor {
    async fn extract(&self, fragment: &str) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "reasoning": { "effort": "low" },
            "instructions": EXTRACTION_INSTRUCTIONS,
            "input": fragment,
        });

        let res = self
            .client
            .post(format!("{}/v1/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("could not reach the inference service")?
            .error_for_status()
            .context("inference service returned an error status")?;

        let reply = res
            .json::<ResponsesReply>()
            .await
            .context("could not decode the inference response")?;

        let text = output_text(&reply);
        if text.is_empty() {
            return Err(anyhow!("inference response contained no output text"));
        }
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

fn output_text(reply: &ResponsesReply) -> String {
    reply
        .output
        .iter()
        .filter(|item| item.kind == "message")
        .flat_map(|item| item.content.iter())
        .filter(|content| content.kind == "output_text")
        .map(|content| content.text.as_str())
        .collect::<Vec<_>>()
        .join("")
}
