use tracing::{info, instrument, warn};

use crate::article::{ArticleNode, POCKET_ARTICLE_NODE_TYPE};
use crate::client::ArticleSource;
use crate::config::SyncOptions;
use crate::error::SyncError;
use crate::fetcher::fetch_all;
use crate::query::RetrieveParams;
use crate::sink::{NodeSink, UpsertOutcome};
use crate::window::{fetch_window_start, Clock};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub since: i64,
    pub touched: usize,
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// One full sync: window, params, touch, fetch, normalize, upsert.
///
/// Options are validated before anything else, so a configuration error never
/// reaches the network or the sink. A fetch error creates no nodes.
#[instrument(skip_all)]
pub async fn source_nodes<S, K>(
    options: &SyncOptions,
    clock: &dyn Clock,
    source: &S,
    sink: &K,
) -> Result<SyncReport, SyncError>
where
    S: ArticleSource + ?Sized,
    K: NodeSink + ?Sized,
{
    options.validate()?;
    let max_records = options.max_records()?;
    let since = fetch_window_start(options, clock.now())?;
    let params = RetrieveParams::new(since, options);
    info!(since, max_records, state = %params.state, "starting sync");

    let mut report = SyncReport {
        since,
        ..SyncReport::default()
    };

    for node in sink.nodes_by_type(POCKET_ARTICLE_NODE_TYPE).await {
        if sink.touch_node(node.id()).await? {
            report.touched += 1;
        }
    }

    let deadline = options.sync_deadline();
    let articles = tokio::time::timeout(deadline, fetch_all(source, &params, max_records))
        .await
        .map_err(|_| {
            warn!(?deadline, "sync deadline exceeded");
            SyncError::Deadline(deadline)
        })??;
    report.fetched = articles.len();

    let nodes: Vec<ArticleNode> = articles.values().map(ArticleNode::from_raw).collect();
    for node in nodes {
        match sink.create_node(node).await? {
            UpsertOutcome::Created => report.created += 1,
            UpsertOutcome::Updated => report.updated += 1,
            UpsertOutcome::Unchanged => report.unchanged += 1,
        }
    }

    info!(
        touched = report.touched,
        fetched = report.fetched,
        created = report.created,
        updated = report.updated,
        unchanged = report.unchanged,
        "sync complete"
    );
    Ok(report)
}
