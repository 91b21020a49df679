use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),
    #[error("could not parse selector {0}")]
    BadSelector(String),
}

/// One page of the portal's receipt listing.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketPage {
    #[serde(default)]
    pub items: Vec<TicketSummary>,
    pub total_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketSummary {
    pub id: String,
}

/// The detail endpoint nests the receipt under a `ticket` field.
#[derive(Debug, Serialize, Deserialize)]
pub struct TicketEnvelope {
    pub ticket: Ticket,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub html_printed_receipt: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_a_listing_page() {
        let body = r#"{"items":[{"id":"0001"},{"id":"0002"}],"totalCount":17}"#;
        let page: TicketPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.total_count, 17);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, "0001");
    }

    #[test]
    fn decodes_a_ticket_envelope() {
        let body = r#"{"ticket":{"htmlPrintedReceipt":"<html></html>","other":1}}"#;
        let envelope: TicketEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.ticket.html_printed_receipt, "<html></html>");
    }
}
