use std::{sync::Arc, time::Duration};

use sqlx::PgPool;

use crate::config::Settings;
use crate::domain::index::IndexManager;
use crate::domain::search::embedder::{HttpEmbedder, MockEmbedder};
use crate::domain::search::reranker::{HttpReranker, MockReranker};
use crate::domain::search::store::PgSearchStore;
use crate::domain::search::{Embedder, Reranker, SearchConfig, SearchEngine};
use crate::repositories::DocumentRepository;

pub type AppSearchEngine = SearchEngine<Arc<dyn Embedder>, Arc<dyn Reranker>, PgSearchStore>;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: Arc<PgPool>,
    pub embedder: Arc<dyn Embedder>,
    pub documents: DocumentRepository,
    pub index_manager: IndexManager,
    pub search_engine: Arc<AppSearchEngine>,
    pub default_max_length: usize,
}

impl AppState {
    pub fn new(db_pool: PgPool, settings: &Settings) -> Self {
        let embedder: Arc<dyn Embedder> = if settings.models.embedding_url == "mock" {
            tracing::warn!("using the mock embedder, set models.embedding_url for real inference");
            Arc::new(MockEmbedder::returning(vec![
                0.1;
                crate::domain::search::embedder::EMBEDDING_DIMENSIONS
            ]))
        } else {
            Arc::new(HttpEmbedder::new(&settings.models))
        };
        let reranker: Arc<dyn Reranker> = if settings.models.reranker_url == "mock" {
            tracing::warn!("using the mock reranker, set models.reranker_url for real inference");
            Arc::new(MockReranker::default())
        } else {
            Arc::new(HttpReranker::new(&settings.models))
        };

        let search_config = SearchConfig {
            model_timeout: Duration::from_secs(settings.models.timeout_secs),
            log_search_queries: settings.search.log_search_queries,
            ..Default::default()
        };
        let search_engine = Arc::new(SearchEngine::new(
            embedder.clone(),
            reranker,
            PgSearchStore::new(db_pool.clone()),
            search_config,
        ));

        Self {
            db_pool: Arc::new(db_pool.clone()),
            embedder,
            documents: DocumentRepository::new(db_pool.clone()),
            index_manager: IndexManager::new(db_pool),
            search_engine,
            default_max_length: settings.segmentation.default_max_length,
        }
    }
}
