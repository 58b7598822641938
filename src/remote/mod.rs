//! # Remote bakery service contract.
//!
//! [`BakeryApi`] is the black-box request/response contract the core depends
//! on. Only the fields the device reads are modelled; everything else in the
//! service's responses is ignored.
//!
//! | Operation          | Input              | Output                               |
//! |--------------------|--------------------|--------------------------------------|
//! | `fetch_catalog`    | device id          | item → per-unit cook seconds         |
//! | `new_customer`     | item → quantity    | new ticket id                        |
//! | `advance_ticket`   | ticket id          | [`AdvanceOutcome`]                   |
//! | `current_ticket`   | device id          | `Some(Ticket)` or `None` (queue empty)|
//! | `skip_ticket`      | ticket id          | `()`                                 |
//!
//! The device identifier is bound when the client is constructed.
//! [`HttpBakeryApi`] is the shipped HTTP implementation.

mod http;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::ApiError;

pub use http::{HttpApiConfig, HttpBakeryApi};

/// Remote-assigned customer ticket identifier.
pub type TicketId = u32;

/// Item (bread kind) identifier.
pub type ItemId = u32;

/// Item → requested quantity, ordered by item id.
pub type Quantities = BTreeMap<ItemId, u32>;

/// A queued customer order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    /// Ticket identifier.
    pub id: TicketId,
    /// Requested quantity per item kind.
    pub items: Quantities,
}

impl Ticket {
    /// Creates a ticket without item detail.
    pub fn new(id: TicketId) -> Self {
        Self {
            id,
            items: Quantities::new(),
        }
    }

    /// Adds an item line (builder style).
    pub fn with_item(mut self, item: ItemId, quantity: u32) -> Self {
        self.items.insert(item, quantity);
        self
    }
}

/// Response of the "advance ticket" call.
///
/// Every field degrades to a default when the service omits it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvanceOutcome {
    /// Ticket now being served, when reported.
    pub current_ticket_id: Option<TicketId>,
    /// Whether the advanced ticket came from the skipped list.
    pub skipped: bool,
    /// Items of the customer now being served.
    pub items: Quantities,
}

/// Request/response contract of the remote bakery service.
#[async_trait]
pub trait BakeryApi: Send + Sync + 'static {
    /// Fetches the item catalog as `(item, cook seconds)` entries.
    async fn fetch_catalog(&self) -> Result<Vec<(ItemId, u32)>, ApiError>;

    /// Submits a new customer and returns the assigned ticket id.
    async fn new_customer(&self, quantities: &Quantities) -> Result<TicketId, ApiError>;

    /// Marks `ticket` as served and returns the next customer's detail.
    async fn advance_ticket(&self, ticket: TicketId) -> Result<AdvanceOutcome, ApiError>;

    /// Returns the ticket currently being served, or `None` when no customer waits.
    async fn current_ticket(&self) -> Result<Option<Ticket>, ApiError>;

    /// Moves `ticket` to the skipped list.
    async fn skip_ticket(&self, ticket: TicketId) -> Result<(), ApiError>;
}
