//! Notification Router (C7): routes typed events to named channels per a
//! declarative symbol/session/default policy.
//!
//! Replaces the source's runtime type discrimination (per the redesign
//! flag in the design notes) with a closed `NotifiableEvent` variant the
//! `ObjectRouter`'s predicates match directly, eliminating downcasts.

mod templates;

use crate::ports::NotificationTransport;
use crate::types::{Side, Trade};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
pub struct Order {
    pub session: String,
    pub symbol: String,
    pub order_id: String,
    pub side: Side,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct SubmitOrder {
    pub session: String,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub volume: Decimal,
}

#[derive(Debug, Clone)]
pub struct PnLReport {
    pub session: String,
    pub symbol: String,
    pub realized: Decimal,
    pub unrealized: Decimal,
    pub as_of: DateTime<Utc>,
}

/// The closed set of event kinds the router can dispatch.
#[derive(Debug, Clone)]
pub enum NotifiableEvent {
    Trade { session: String, trade: Trade },
    Order(Order),
    SubmitOrder(SubmitOrder),
    PnLReport(PnLReport),
}

impl NotifiableEvent {
    pub fn session(&self) -> &str {
        match self {
            NotifiableEvent::Trade { session, .. } => session,
            NotifiableEvent::Order(o) => &o.session,
            NotifiableEvent::SubmitOrder(o) => &o.session,
            NotifiableEvent::PnLReport(r) => &r.session,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            NotifiableEvent::Trade { trade, .. } => &trade.symbol,
            NotifiableEvent::Order(o) => &o.symbol,
            NotifiableEvent::SubmitOrder(o) => &o.symbol,
            NotifiableEvent::PnLReport(r) => &r.symbol,
        }
    }
}

/// How one event kind is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    Silent,
    Session,
    Symbol,
}

/// symbol → channel name.
#[derive(Default)]
pub struct SymbolRouter {
    channels: HashMap<String, String>,
}

impl SymbolRouter {
    pub fn new(channels: HashMap<String, String>) -> Self {
        Self { channels }
    }

    pub fn route(&self, symbol: &str) -> Option<&str> {
        self.channels.get(symbol).map(String::as_str)
    }
}

/// session name → channel name.
#[derive(Default)]
pub struct SessionRouter {
    channels: HashMap<String, String>,
}

impl SessionRouter {
    pub fn new(channels: HashMap<String, String>) -> Self {
        Self { channels }
    }

    pub fn route(&self, session: &str) -> Option<&str> {
        self.channels.get(session).map(String::as_str)
    }
}

pub type Predicate = Box<dyn Fn(&NotifiableEvent) -> Option<String> + Send + Sync>;

/// Ordered list of predicates; first match wins.
#[derive(Default)]
pub struct ObjectRouter {
    predicates: Vec<Predicate>,
}

impl ObjectRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    pub fn route(&self, event: &NotifiableEvent) -> Option<String> {
        self.predicates.iter().find_map(|p| p(event))
    }
}

/// Per-event-kind routing configuration.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub symbol_channels: HashMap<String, String>,
    pub session_channels: HashMap<String, String>,
    pub trade: RoutingMode,
    pub order: RoutingMode,
    pub submit_order: RoutingMode,
    pub pnl: RoutingMode,
    pub default_channel: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            symbol_channels: HashMap::new(),
            session_channels: HashMap::new(),
            trade: RoutingMode::Silent,
            order: RoutingMode::Silent,
            submit_order: RoutingMode::Silent,
            pnl: RoutingMode::Silent,
            default_channel: "#default".to_string(),
        }
    }
}

/// Routes `NotifiableEvent`s to channels per `NotificationConfig`, then
/// renders and forwards to the injected `NotificationTransport`. Routing
/// tables are fixed at construction (mutated only during configuration,
/// per the concurrency model) and read-only thereafter.
pub struct NotificationRouter {
    session_router: SessionRouter,
    object_router: ObjectRouter,
    config: NotificationConfig,
    transport: Arc<dyn NotificationTransport>,
}

impl NotificationRouter {
    pub fn new(config: NotificationConfig, transport: Arc<dyn NotificationTransport>) -> Self {
        let session_router = SessionRouter::new(config.session_channels.clone());

        let mut object_router = ObjectRouter::new();
        let any_symbol_routed = [config.trade, config.order, config.submit_order, config.pnl]
            .contains(&RoutingMode::Symbol);
        if any_symbol_routed {
            object_router.add(symbol_route_predicate(config.symbol_channels.clone()));
        }

        Self {
            session_router,
            object_router,
            config,
            transport,
        }
    }

    fn mode_for(&self, event: &NotifiableEvent) -> RoutingMode {
        match event {
            NotifiableEvent::Trade { .. } => self.config.trade,
            NotifiableEvent::Order(_) => self.config.order,
            NotifiableEvent::SubmitOrder(_) => self.config.submit_order,
            NotifiableEvent::PnLReport(_) => self.config.pnl,
        }
    }

    /// Resolve a channel and forward the rendered event, or do nothing if
    /// the configured mode for this event kind is `silent`.
    pub async fn notify(&self, event: NotifiableEvent) {
        let mode = self.mode_for(&event);
        let channel = match mode {
            RoutingMode::Silent => return,
            RoutingMode::Session => self
                .session_router
                .route(event.session())
                .map(str::to_string)
                .unwrap_or_else(|| self.config.default_channel.clone()),
            RoutingMode::Symbol => self
                .object_router
                .route(&event)
                .unwrap_or_else(|| self.config.default_channel.clone()),
        };

        let text = templates::render(&event);
        self.transport.notify(&channel, &text, &event).await;
    }
}

/// Casts to the event's symbol and dispatches via `SymbolRouter.route`,
/// per §4.8: "register an ObjectRouter predicate that casts to the event
/// type, then dispatches via SymbolRouter.Route(event.symbol())". Returns
/// `None` (no match) when the symbol has no configured channel, letting
/// the caller fall back to the default channel.
fn symbol_route_predicate(channels: HashMap<String, String>) -> Predicate {
    let router = SymbolRouter::new(channels);
    Box::new(move |event: &NotifiableEvent| router.route(event.symbol()).map(str::to_string))
}

/// An in-tree `NotificationTransport` that renders through `tracing`,
/// matching the teacher's default of logging everything even when a
/// richer transport is layered on top downstream.
pub struct LoggingTransport {
    sent: RwLock<Vec<(String, String)>>,
}

impl LoggingTransport {
    pub fn new() -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.read().expect("transport lock poisoned").clone()
    }
}

impl Default for LoggingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NotificationTransport for LoggingTransport {
    async fn notify(&self, channel: &str, text: &str, _event: &NotifiableEvent) {
        tracing::info!(channel, "{text}");
        self.sent
            .write()
            .expect("transport lock poisoned")
            .push((channel.to_string(), text.to_string()));
    }
}
