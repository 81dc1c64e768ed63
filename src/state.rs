// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

use std::sync::Arc;

use crate::config::{Environment, PublicApi};
use crate::health::Readiness;
use crate::proxy::ServiceProxy;
use crate::session::{SessionStore, SigningKey};
use crate::users::UserStore;
use crate::version::VersionPolicy;

#[derive(Clone)]
pub struct AppState {
    pub signing_key: SigningKey,
    pub sessions: Arc<dyn SessionStore>,
    pub users: Arc<dyn UserStore>,
    pub versions: Arc<VersionPolicy>,
    pub readiness: Readiness,
    pub public_api: Arc<PublicApi>,
    pub environment: Environment,
    pub aqrest: Arc<ServiceProxy>,
}

impl AppState {
    pub fn new(
        signing_key: SigningKey,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        aqrest: ServiceProxy,
    ) -> Self {
        Self {
            signing_key,
            sessions,
            users,
            versions: Arc::new(VersionPolicy::default()),
            readiness: Readiness::default(),
            public_api: Arc::new(PublicApi::default()),
            environment: Environment::Development,
            aqrest: Arc::new(aqrest),
        }
    }

    pub fn with_public_api(mut self, public_api: PublicApi) -> Self {
        self.public_api = Arc::new(public_api);
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }
}

#[cfg(test)]
impl AppState {
    /// In-memory stores and a proxy target nothing listens on.
    pub fn for_tests() -> Self {
        use std::time::Duration;

        use crate::session::MemorySessionStore;
        use crate::users::InMemoryUserStore;

        Self::new(
            SigningKey::new("test signing key").unwrap(),
            Arc::new(MemorySessionStore::new(Duration::from_secs(60))),
            Arc::new(InMemoryUserStore::new()),
            ServiceProxy::new("http://127.0.0.1:9").unwrap(),
        )
    }
}
