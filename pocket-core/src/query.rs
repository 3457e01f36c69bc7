use serde::Serialize;

use crate::config::SyncOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sort {
    Newest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailType {
    Complete,
}

/// Retrieve parameters for one remote call. Built once per sync and never mutated;
/// pagination derives fresh copies through [`RetrieveParams::page`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveParams {
    pub sort: Sort,
    pub count: u32,
    pub detail_type: DetailType,
    pub state: String,
    pub since: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl RetrieveParams {
    /// `count` is the record cap from the options, or 0 if it is unset; the sync
    /// validates the cap before building params.
    pub fn new(since: i64, options: &SyncOptions) -> Self {
        Self {
            sort: Sort::Newest,
            count: options.api_max_records_to_return.unwrap_or_default(),
            detail_type: DetailType::Complete,
            state: options.state_filter_string.clone(),
            since,
            offset: None,
            tag: filter(options.tag_filter, &options.tag_filter_string),
            favorite: filter(options.favourite_filter, &options.favourite_filter_value),
            search: filter(options.search_filter, &options.search_filter_string),
            domain: filter(options.domain_filter, &options.domain_filter_string),
        }
    }

    pub fn page(&self, offset: u32, count: u32) -> Self {
        Self {
            offset: Some(offset),
            count,
            ..self.clone()
        }
    }
}

fn filter(enabled: bool, value: &Option<String>) -> Option<String> {
    if enabled {
        Some(value.clone().unwrap_or_default())
    } else {
        None
    }
}
