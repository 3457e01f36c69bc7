pub mod article;
pub mod client;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod query;
pub mod sink;
pub mod storage;
pub mod sync;
pub mod window;

pub use article::{ArticleImage, ArticleNode, ArticleRecord, RawArticle, POCKET_ARTICLE_NODE_TYPE};
pub use client::{ArticleSource, PocketClient, RetrieveResponse};
pub use config::SyncOptions;
pub use error::{ConfigError, StoreError, SyncError};
pub use fetcher::{fetch_all, MAX_PAGE_SIZE};
pub use query::RetrieveParams;
pub use sink::{NodeSink, UpsertOutcome};
pub use storage::NodeStore;
pub use sync::{source_nodes, SyncReport};
pub use window::{fetch_window_start, Clock, FixedClock, SystemClock};
