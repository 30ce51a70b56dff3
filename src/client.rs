use std::path::Path;

use crate::config::ClientConfig;
use crate::download::{ProductTransferEngine, TransferEngine, TransferOutcome};
use crate::error::Result;
use crate::query::SearchCriteria;
use crate::search::{CatalogEngine, CatalogSearcher, HttpTransport, QueryResult};

/// Search and download front end.
///
/// Holds one searcher and one transfer engine; either can be swapped for a
/// test double through [`Client::from_parts`].
#[derive(Debug, Clone)]
pub struct Client<S = CatalogEngine, T = TransferEngine> {
    searcher: S,
    transfer: T,
}

impl Client {
    /// Creates a client for the hub described by `config`.
    ///
    /// Both engines share one connection pool.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self {
            searcher: CatalogEngine::with_transport(transport.clone(), &config),
            transfer: TransferEngine::with_transport(transport, &config),
        })
    }

    /// Creates a client from `SCIHUB_*` environment variables and/or `.scihubrc`.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }
}

impl<S, T> Client<S, T> {
    pub fn from_parts(searcher: S, transfer: T) -> Self {
        Self { searcher, transfer }
    }

    pub fn searcher(&self) -> &S {
        &self.searcher
    }

    pub fn transfer(&self) -> &T {
        &self.transfer
    }
}

impl<S: CatalogSearcher, T> Client<S, T> {
    /// Runs a search and collects every page of results.
    pub fn search(&self, criteria: &SearchCriteria) -> Result<QueryResult> {
        self.searcher.search(criteria)
    }
}

impl<S, T: ProductTransferEngine> Client<S, T> {
    /// Downloads one product into `dest_dir` and verifies its checksum.
    ///
    /// Archived products come back as [`TransferOutcome::ArchivePending`];
    /// nothing is polled on the caller's behalf.
    pub fn download(&self, id: &str, dest_dir: &Path) -> Result<TransferOutcome> {
        self.transfer.download(id, dest_dir)
    }

    pub fn is_online(&self, id: &str) -> Result<bool> {
        self.transfer.is_online(id)
    }
}

impl<S: CatalogSearcher, T> CatalogSearcher for Client<S, T> {
    fn search(&self, criteria: &SearchCriteria) -> Result<QueryResult> {
        self.searcher.search(criteria)
    }
}

impl<S, T: ProductTransferEngine> ProductTransferEngine for Client<S, T> {
    fn download(&self, id: &str, dest_dir: &Path) -> Result<TransferOutcome> {
        self.transfer.download(id, dest_dir)
    }

    fn is_online(&self, id: &str) -> Result<bool> {
        self.transfer.is_online(id)
    }
}
