// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::config::Config;
use crate::rate_limit::RateLimiter;
use crate::service::RecipientService;
use crate::storage::RecipientStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub recipients: RecipientService,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn RecipientStore>) -> Self {
        let recipients = RecipientService::new(store, config.salt.as_str());
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Self {
            config: Arc::new(config),
            recipients,
            rate_limiter,
        }
    }
}

#[cfg(test)]
impl Default for AppState {
    fn default() -> Self {
        Self::new(
            crate::config::test_config(),
            Arc::new(crate::store::InMemoryStore::new()),
        )
    }
}
