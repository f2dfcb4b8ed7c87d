use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::qbittorrent::QBittorrentClient;
use super::sabnzbd::SabnzbdClient;
use super::types::{DispatchError, DownloadClient, DownloadClientError, GrabReceipt};
use crate::config::DownloadClientsConfig;
use crate::indexer::IndexerStore;
use crate::metrics;
use crate::searcher::Release;
use crate::selection::QualityProfile;

/// Routes releases to the configured download clients.
pub struct Dispatcher {
    clients: Vec<Arc<dyn DownloadClient>>,
    store: Arc<dyn IndexerStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn IndexerStore>) -> Self {
        Self {
            clients: Vec::new(),
            store,
        }
    }

    /// Clients are tried in registration order when none is named.
    pub fn with_client(mut self, client: Arc<dyn DownloadClient>) -> Self {
        self.clients.push(client);
        self
    }

    /// Dispatcher with every client present in `config`.
    pub fn from_config(
        config: &DownloadClientsConfig,
        store: Arc<dyn IndexerStore>,
    ) -> Result<Self, DownloadClientError> {
        let mut dispatcher = Self::new(store);
        if let Some(qb) = &config.qbittorrent {
            dispatcher = dispatcher.with_client(Arc::new(QBittorrentClient::new(qb.clone())?));
        }
        if let Some(sab) = &config.sabnzbd {
            dispatcher = dispatcher.with_client(Arc::new(SabnzbdClient::new(sab.clone())?));
        }
        Ok(dispatcher)
    }

    pub fn client_names(&self) -> Vec<&str> {
        self.clients.iter().map(|c| c.name()).collect()
    }

    fn pick(
        &self,
        release: &Release,
        name: Option<&str>,
    ) -> Result<&Arc<dyn DownloadClient>, DispatchError> {
        match name {
            Some(name) => {
                let client = self
                    .clients
                    .iter()
                    .find(|c| c.name() == name)
                    .ok_or_else(|| DispatchError::ClientNotFound(name.to_string()))?;
                if !client.protocols().contains(&release.protocol) {
                    return Err(DispatchError::ProtocolMismatch {
                        client: name.to_string(),
                        protocol: release.protocol,
                    });
                }
                Ok(client)
            }
            None => self
                .clients
                .iter()
                .find(|c| c.protocols().contains(&release.protocol))
                .ok_or(DispatchError::NoClientForProtocol(release.protocol)),
        }
    }

    /// Hand `release` to the named client, or the first one for its protocol.
    pub async fn grab(
        &self,
        release: &Release,
        client: Option<&str>,
    ) -> Result<GrabReceipt, DispatchError> {
        let client = self.pick(release, client)?;

        let uri = match release.download.auth_param {
            Some(_) => {
                let indexer = self.store.get(&release.indexer_id)?;
                release.download.resolve(indexer.credentials.api_key())
            }
            None => release.download.uri.clone(),
        };

        if let Err(source) = client.grab(&uri, release.protocol).await {
            metrics::GRABS_TOTAL
                .with_label_values(&[client.name(), "failure"])
                .inc();
            warn!(
                client = client.name(),
                release = %release.key,
                error = %source,
                "Grab failed"
            );
            return Err(DispatchError::Client {
                client: client.name().to_string(),
                source,
            });
        }

        metrics::GRABS_TOTAL
            .with_label_values(&[client.name(), "success"])
            .inc();
        info!(
            client = client.name(),
            release = %release.key,
            title = %release.title,
            "Release sent to download client"
        );

        Ok(GrabReceipt {
            grab_id: Uuid::new_v4(),
            client: client.name().to_string(),
            release_key: release.key.clone(),
            title: release.title.clone(),
            protocol: release.protocol,
            quality: QualityProfile::detect(&release.title).to_string(),
            indexer_id: release.indexer_id.clone(),
            grabbed_at: Utc::now(),
        })
    }
}
