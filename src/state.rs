/*
 * Responsibility
 * - Shared per-process context handed to the Router (AppState)
 * - Clone is cheap: everything is behind an Arc
 */
use std::sync::Arc;

use crate::services::auth::identity::IdentityDelegate;
use crate::services::auth::token::TokenValidator;
use crate::services::proxy::{Forwarder, RouteTable};

#[derive(Clone)]
pub struct AppState {
    pub validator: Arc<TokenValidator>,
    pub identity: Arc<dyn IdentityDelegate>,
    pub routes: Arc<RouteTable>,
    pub forwarder: Arc<Forwarder>,
}

impl AppState {
    pub fn new(
        validator: Arc<TokenValidator>,
        identity: Arc<dyn IdentityDelegate>,
        routes: Arc<RouteTable>,
        forwarder: Arc<Forwarder>,
    ) -> Self {
        Self {
            validator,
            identity,
            routes,
            forwarder,
        }
    }
}
