use crate::{config::ApplicationConfig, types::ApplicationSigner};
use std::{collections::HashMap, sync::Arc};

/// A staked application and the chains it may relay for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub id: String,
    pub signer: Arc<ApplicationSigner>,
    pub chains: Vec<String>,
}

impl Application {
    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.signer.public_key
    }

    #[must_use]
    pub fn serves_chain(&self, chain: &str) -> bool {
        self.chains.iter().any(|c| c == chain)
    }
}

impl From<&ApplicationConfig> for Application {
    fn from(config: &ApplicationConfig) -> Self {
        Self {
            id: config.id.clone(),
            signer: Arc::new(ApplicationSigner {
                public_key: config.public_key.clone(),
                address: config.address.clone(),
            }),
            chains: config.chains.clone(),
        }
    }
}

pub trait AppsRegistry: Send + Sync {
    fn get_applications(&self) -> Vec<Arc<Application>>;

    fn get_application_by_public_key(&self, public_key: &str) -> Option<Arc<Application>>;

    fn get_applications_by_chain(&self, chain: &str) -> Vec<Arc<Application>> {
        self.get_applications().into_iter().filter(|app| app.serves_chain(chain)).collect()
    }
}

/// Applications fixed at startup from configuration.
#[derive(Debug, Default)]
pub struct StaticAppsRegistry {
    applications: Vec<Arc<Application>>,
    by_public_key: HashMap<String, Arc<Application>>,
}

impl StaticAppsRegistry {
    #[must_use]
    pub fn new(applications: Vec<Application>) -> Self {
        let applications: Vec<Arc<Application>> = applications.into_iter().map(Arc::new).collect();
        let by_public_key = applications
            .iter()
            .map(|app| (app.public_key().to_string(), app.clone()))
            .collect();

        Self { applications, by_public_key }
    }

    #[must_use]
    pub fn from_config(applications: &[ApplicationConfig]) -> Self {
        Self::new(applications.iter().map(Application::from).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.applications.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }
}

impl AppsRegistry for StaticAppsRegistry {
    fn get_applications(&self) -> Vec<Arc<Application>> {
        self.applications.clone()
    }

    fn get_application_by_public_key(&self, public_key: &str) -> Option<Arc<Application>> {
        self.by_public_key.get(public_key).cloned()
    }
}
