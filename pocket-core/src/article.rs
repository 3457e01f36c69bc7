use std::fmt::Write as _;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::window::{day_bucket, week_bucket};

pub const POCKET_ARTICLE_NODE_TYPE: &str = "PocketArticle";

const NODE_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a8e_4b7d_5e39_a0c4_1d92_7b3f_e815);

const FAVICON_BASE: &str = "https://s2.googleusercontent.com/s2/favicons?domain_url=";

/// One entry of the remote `list` object, kept as loosely typed as the API sends it.
/// Unknown fields survive in `extra` and an explicit `null` stays `Some(Value::Null)`,
/// so the content digest covers the record exactly as received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RawArticle {
    #[serde(default, deserialize_with = "id_string")]
    pub item_id: String,
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<Value>,
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub resolved_title: Option<Value>,
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<Value>,
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub favorite: Option<Value>,
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub is_article: Option<Value>,
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub is_index: Option<Value>,
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub has_video: Option<Value>,
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub has_image: Option<Value>,
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub image: Option<Value>,
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub word_count: Option<Value>,
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub tags: Option<Value>,
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub time_added: Option<Value>,
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub time_updated: Option<Value>,
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub time_read: Option<Value>,
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawArticle {
    /// Key-sorted JSON of the record, independent of field arrival order.
    pub fn canonical_json(&self) -> String {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        let mut out = String::new();
        write_canonical(&value, &mut out);
        out
    }

    pub fn content_digest(&self) -> String {
        digest_hex(&self.canonical_json())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArticleImage {
    pub item_id: String,
    pub src: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    pub id: String,
    pub item_id: String,
    pub read_day: i64,
    pub read_week: i64,
    pub url: Option<String>,
    pub title: Option<String>,
    pub article_domain: String,
    pub domain_favicon: String,
    pub favourite: bool,
    pub favorite: bool,
    pub excerpt: Option<String>,
    pub is_article: bool,
    pub is_index: bool,
    pub has_video: bool,
    pub has_image: bool,
    pub word_count: Option<i64>,
    pub tags: Vec<String>,
    pub time_added: Option<i64>,
    pub time_updated: Option<i64>,
    pub time_read: Option<i64>,
    pub status: Option<String>,
    pub image: Option<ArticleImage>,
    pub content_digest: String,
}

impl ArticleRecord {
    /// Maps a remote record into the node schema. Never fails: malformed fields
    /// degrade to empty, zero or `None`.
    pub fn from_raw(raw: &RawArticle) -> Self {
        let has_image = strict_bool(raw.has_image.as_ref());
        let time_read = raw.time_read.as_ref().and_then(parse_int);
        let url = raw.resolved_url.as_ref().and_then(value_string);
        let article_domain = url.as_deref().map(hostname).unwrap_or_default();

        let image = raw
            .image
            .as_ref()
            .filter(|_| has_image)
            .and_then(Value::as_object)
            .map(|image| ArticleImage {
                item_id: image
                    .get("item_id")
                    .and_then(value_string)
                    .unwrap_or_else(|| raw.item_id.clone()),
                src: image.get("src").and_then(value_string),
                width: image.get("width").and_then(parse_int),
                height: image.get("height").and_then(parse_int),
            });

        Self {
            id: node_id(&raw.item_id),
            item_id: raw.item_id.clone(),
            read_day: day_bucket(time_read),
            read_week: week_bucket(time_read),
            url,
            title: raw.resolved_title.as_ref().and_then(value_string),
            domain_favicon: format!("{FAVICON_BASE}{article_domain}"),
            article_domain,
            favourite: strict_bool(raw.favorite.as_ref()),
            favorite: strict_bool(raw.favorite.as_ref()),
            excerpt: raw.excerpt.as_ref().and_then(value_string),
            is_article: strict_bool(raw.is_article.as_ref()),
            is_index: strict_bool(raw.is_index.as_ref()),
            has_video: strict_bool(raw.has_video.as_ref()),
            has_image,
            word_count: raw.word_count.as_ref().and_then(parse_int),
            tags: tag_names(raw.tags.as_ref()),
            time_added: raw.time_added.as_ref().and_then(parse_int),
            time_updated: raw.time_updated.as_ref().and_then(parse_int),
            time_read,
            status: raw.status.as_ref().and_then(value_string),
            image,
            content_digest: raw.content_digest(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeInternal {
    #[serde(rename = "type")]
    pub type_name: String,
    pub content_digest: String,
    pub content: String,
}

/// The unit handed to a [`crate::sink::NodeSink`]: a record plus graph bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArticleNode {
    pub parent: Option<String>,
    pub children: Vec<String>,
    #[serde(flatten)]
    pub record: ArticleRecord,
    pub internal: NodeInternal,
}

impl ArticleNode {
    pub fn from_raw(raw: &RawArticle) -> Self {
        let content = raw.canonical_json();
        let record = ArticleRecord::from_raw(raw);
        Self {
            parent: None,
            children: Vec::new(),
            internal: NodeInternal {
                type_name: POCKET_ARTICLE_NODE_TYPE.to_string(),
                content_digest: record.content_digest.clone(),
                content,
            },
            record,
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn type_name(&self) -> &str {
        &self.internal.type_name
    }

    pub fn content_digest(&self) -> &str {
        &self.internal.content_digest
    }
}

pub fn node_id(item_id: &str) -> String {
    let seed = format!("{POCKET_ARTICLE_NODE_TYPE}-{item_id}");
    Uuid::new_v5(&NODE_ID_NAMESPACE, seed.as_bytes()).to_string()
}

/// True only for JSON `true`; `"1"`, `1` and `"true"` all stay false.
pub fn strict_bool(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

/// Base-10 integer from a JSON number or numeric string; anything else is `None`.
pub fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn hostname(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_owned))
        .unwrap_or_default()
}

fn tag_names(tags: Option<&Value>) -> Vec<String> {
    let mut names: Vec<String> = match tags {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        Some(Value::Array(items)) => items.iter().filter_map(value_string).collect(),
        _ => Vec::new(),
    };
    names.sort();
    names
}

fn digest_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}:", Value::String(key.clone()));
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

// Present-but-null stays distinguishable from absent.
fn keep_null<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(value_string)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawArticle {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn normalizes_the_reference_article() {
        let article = raw(json!({
            "item_id": "1",
            "resolved_url": "https://example.com/a",
            "time_read": "1700000000",
            "favorite": "1",
            "has_image": false
        }));
        let record = ArticleRecord::from_raw(&article);

        assert_eq!(record.article_domain, "example.com");
        assert_eq!(
            record.domain_favicon,
            "https://s2.googleusercontent.com/s2/favicons?domain_url=example.com"
        );
        assert!(!record.favourite);
        assert!(!record.favorite);
        assert!(!record.has_image);
        assert_eq!(record.image, None);
        assert_eq!(record.time_read, Some(1_700_000_000));
        assert_eq!(record.read_day, 1_699_920_000);
        assert_eq!(record.read_week, 1_699_747_200);
        assert!(record.tags.is_empty());
    }

    #[test]
    fn id_depends_only_on_item_id() {
        let a = ArticleRecord::from_raw(&raw(json!({"item_id": "42", "excerpt": "one"})));
        let b = ArticleRecord::from_raw(&raw(json!({"item_id": "42", "excerpt": "two"})));
        let c = ArticleRecord::from_raw(&raw(json!({"item_id": 43})));

        assert_eq!(a.id, b.id);
        assert_eq!(a.id, node_id("42"));
        assert_ne!(a.id, c.id);
        assert_eq!(c.item_id, "43");
    }

    #[test]
    fn digest_is_stable_and_tracks_changes() {
        let first = raw(json!({"item_id": "7", "resolved_title": "T", "word_count": "120"}));
        let reordered = raw(json!({"word_count": "120", "resolved_title": "T", "item_id": "7"}));
        let changed = raw(json!({"item_id": "7", "resolved_title": "T", "word_count": "121"}));
        let extra = raw(json!({"item_id": "7", "resolved_title": "T", "word_count": "120", "lang": "en"}));

        let digest = ArticleRecord::from_raw(&first).content_digest;
        assert_eq!(digest, ArticleRecord::from_raw(&first).content_digest);
        assert_eq!(digest, ArticleRecord::from_raw(&reordered).content_digest);
        assert_ne!(digest, ArticleRecord::from_raw(&changed).content_digest);
        assert_ne!(digest, ArticleRecord::from_raw(&extra).content_digest);
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn explicit_null_changes_the_digest() {
        let absent = raw(json!({"item_id": "8"}));
        let null = raw(json!({"item_id": "8", "excerpt": null}));

        assert_eq!(null.excerpt, Some(Value::Null));
        assert_ne!(absent.content_digest(), null.content_digest());
        assert_eq!(ArticleRecord::from_raw(&null).excerpt, None);
    }

    #[test]
    fn mistyped_text_fields_degrade() {
        let record = ArticleRecord::from_raw(&raw(json!({
            "item_id": "12",
            "resolved_title": 12345,
            "resolved_url": {"href": "https://example.com"},
            "excerpt": ["a", "b"]
        })));

        assert_eq!(record.title.as_deref(), Some("12345"));
        assert_eq!(record.url, None);
        assert_eq!(record.article_domain, "");
        assert_eq!(record.excerpt, None);
    }

    #[test]
    fn missing_url_yields_empty_domain() {
        let record = ArticleRecord::from_raw(&raw(json!({"item_id": "9"})));
        assert_eq!(record.article_domain, "");
        assert_eq!(
            record.domain_favicon,
            "https://s2.googleusercontent.com/s2/favicons?domain_url="
        );

        let record = ArticleRecord::from_raw(&raw(json!({"item_id": "9", "resolved_url": "not a url"})));
        assert_eq!(record.article_domain, "");
    }

    #[test]
    fn flags_require_json_true() {
        let record = ArticleRecord::from_raw(&raw(json!({
            "item_id": "3",
            "favorite": true,
            "is_article": 1,
            "is_index": "true",
            "has_video": true,
            "has_image": true,
            "image": {"item_id": "3", "src": "https://img/x.png", "width": "640", "height": 0}
        })));

        assert!(record.favourite);
        assert!(!record.is_article);
        assert!(!record.is_index);
        assert!(record.has_video);
        assert_eq!(
            record.image,
            Some(ArticleImage {
                item_id: "3".into(),
                src: Some("https://img/x.png".into()),
                width: Some(640),
                height: Some(0),
            })
        );
    }

    #[test]
    fn image_requires_has_image() {
        let record = ArticleRecord::from_raw(&raw(json!({
            "item_id": "4",
            "has_image": "1",
            "image": {"src": "https://img/y.png"}
        })));
        assert_eq!(record.image, None);
    }

    #[test]
    fn malformed_numbers_become_none() {
        let record = ArticleRecord::from_raw(&raw(json!({
            "item_id": "5",
            "word_count": "many",
            "time_read": "0",
            "time_added": 1_600_000_000,
            "tags": {"zig": {"tag": "zig"}, "rust": {"tag": "rust"}}
        })));

        assert_eq!(record.word_count, None);
        assert_eq!(record.time_read, Some(0));
        assert_eq!(record.read_day, 0);
        assert_eq!(record.read_week, 0);
        assert_eq!(record.time_added, Some(1_600_000_000));
        assert_eq!(record.tags, vec!["rust".to_string(), "zig".to_string()]);
    }

    #[test]
    fn node_wraps_record_with_internal_metadata() {
        let article = raw(json!({"item_id": "11", "resolved_title": "Hello"}));
        let node = ArticleNode::from_raw(&article);
        let value = serde_json::to_value(&node).unwrap();

        assert_eq!(value["id"], node_id("11"));
        assert_eq!(value["title"], "Hello");
        assert_eq!(value["parent"], Value::Null);
        assert_eq!(value["internal"]["type"], POCKET_ARTICLE_NODE_TYPE);
        assert_eq!(value["internal"]["contentDigest"], value["contentDigest"]);
        assert_eq!(node.internal.content, article.canonical_json());

        let back: ArticleNode = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }
}
