use anyhow::Context;
use reqwest::{header, Client};

use crate::{
    config::PortalConfig,
    types::{TicketEnvelope, TicketPage},
};

/// Client for the receipt portal. Every request carries the externally
/// supplied session cookie; there is no login flow.
pub struct PortalClient {
    client: Client,
    base_url: String,
    cookie: String,
    country: String,
    language: String,
}

impl PortalClient {
    pub fn new(config: &PortalConfig) -> Self {
        PortalClient {
            client: Client::new(),
            base_url: config.base_url.clone(),
            cookie: config.cookie.clone(),
            country: config.country.clone(),
            language: config.language.clone(),
        }
    }

    /// Fetches one page of the receipt listing.
    pub async fn ticket_page(&self, page: u32) -> anyhow::Result<TicketPage> {
        let res = self
            .client
            .get(format!("{}/tickets", self.base_url))
            .header(header::COOKIE, self.cookie.as_str())
            .header(header::CONTENT_TYPE, "application/json")
            .query(&[
                ("country", self.country.as_str()),
                ("page", page.to_string().as_str()),
            ])
            .send()
            .await
            .context(format!("could not request listing page {}", page))?
            .error_for_status()
            .context(format!("listing page {} returned an error status", page))?;

        let listing = res
            .json::<TicketPage>()
            .await
            .context("could not decode listing page")?;
        Ok(listing)
    }

    /// Fetches the raw HTML body of one receipt.
    pub async fn ticket_detail(&self, id: &str) -> anyhow::Result<String> {
        let res = self
            .client
            .get(format!("{}/tickets/{}", self.base_url, id))
            .header(header::COOKIE, self.cookie.as_str())
            .header(header::CONTENT_TYPE, "application/json")
            .query(&[
                ("country", self.country.as_str()),
                ("languageCode", self.language.as_str()),
            ])
            .send()
            .await
            .context(format!("could not request receipt {}", id))?
            .error_for_status()
            .context(format!("receipt {} returned an error status", id))?;

        let envelope = res
            .json::<TicketEnvelope>()
            .await
            .context(format!("could not decode receipt {}", id))?;
        Ok(envelope.ticket.html_printed_receipt)
    }
}
