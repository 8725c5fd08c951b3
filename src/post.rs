//! Defines the [`PostSummary`], [`PostDetail`], and [`Section`] types along
//! with their deserialization from content API documents and their conversion
//! into template values (see [`PostSummary::to_value`] and
//! [`PostDetail::to_value`]).

use crate::reading_time;
use crate::richtext::{escape_text, RichText};
use chrono::{DateTime, FixedOffset, Locale};
use gtmpl::Value;
use serde::de::Error;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use url::Url;

/// The post fields shown on index pages.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "Document<SummaryData>")]
pub struct PostSummary {
    /// The post's unique, URL-safe identifier (the document `uid`). Empty when
    /// the document has none, in which case the post has no page.
    pub identifier: String,
    pub publication_date: Option<DateTime<FixedOffset>>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

/// The full contents of a post, as shown on its own page.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "Document<DetailData>")]
pub struct PostDetail {
    pub publication_date: Option<DateTime<FixedOffset>>,
    pub title: String,
    pub banner_url: String,
    pub author: String,
    pub sections: Vec<Section>,
}

/// A titled group of paragraphs within a [`PostDetail`].
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Section {
    #[serde(default, deserialize_with = "null_as_default")]
    pub heading: String,

    #[serde(default)]
    pub body: RichText,
}

/// The envelope every content API document arrives in.
#[derive(Deserialize)]
pub struct Document<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    uid: String,

    #[serde(default, deserialize_with = "deserialize_date")]
    first_publication_date: Option<DateTime<FixedOffset>>,

    data: T,
}

#[derive(Deserialize)]
pub struct SummaryData {
    #[serde(default, deserialize_with = "null_as_default")]
    title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    subtitle: String,

    #[serde(default, deserialize_with = "null_as_default")]
    author: String,
}

#[derive(Deserialize)]
pub struct DetailData {
    #[serde(default, deserialize_with = "null_as_default")]
    title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    banner: Banner,

    #[serde(default, deserialize_with = "null_as_default")]
    author: String,

    #[serde(default, deserialize_with = "null_as_default")]
    content: Vec<Section>,
}

#[derive(Default, Deserialize)]
struct Banner {
    #[serde(default, deserialize_with = "null_as_default")]
    url: String,
}

impl From<Document<SummaryData>> for PostSummary {
    fn from(doc: Document<SummaryData>) -> PostSummary {
        PostSummary {
            identifier: doc.uid,
            publication_date: doc.first_publication_date,
            title: doc.data.title,
            subtitle: doc.data.subtitle,
            author: doc.data.author,
        }
    }
}

impl From<Document<DetailData>> for PostDetail {
    fn from(doc: Document<DetailData>) -> PostDetail {
        PostDetail {
            publication_date: doc.first_publication_date,
            title: doc.data.title,
            banner_url: doc.data.banner.url,
            author: doc.data.author,
            sections: doc.data.content,
        }
    }
}

impl PostSummary {
    /// The name of the post's output file, or `None` if the post has no
    /// identifier.
    pub fn file_name(&self) -> Option<String> {
        match self.identifier.is_empty() {
            true => None,
            false => Some(format!("{}.html", slug::slugify(&self.identifier))),
        }
    }

    /// Converts the summary into a template value with fields `identifier`,
    /// `title`, `subtitle`, `author`, `date` and `url` (nil when the post has
    /// no page). Text fields are HTML-escaped.
    pub fn to_value(&self, url: Option<&Url>) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("identifier".to_owned(), text(&self.identifier));
        m.insert("title".to_owned(), text(&self.title));
        m.insert("subtitle".to_owned(), text(&self.subtitle));
        m.insert("author".to_owned(), text(&self.author));
        m.insert(
            "date".to_owned(),
            Value::String(format_date(self.publication_date.as_ref())),
        );
        m.insert(
            "url".to_owned(),
            match url {
                Some(url) => Value::String(url.to_string()),
                None => Value::Nil,
            },
        );
        Value::Object(m)
    }
}

impl PostDetail {
    /// Converts the post into a template value with fields `title`, `author`,
    /// `banner_url`, `date`, `reading_time` (whole minutes) and `sections`,
    /// each section carrying its `heading`, an `anchor` slug and its `body` as
    /// HTML.
    pub fn to_value(&self) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), text(&self.title));
        m.insert("author".to_owned(), text(&self.author));
        m.insert("banner_url".to_owned(), text(&self.banner_url));
        m.insert(
            "date".to_owned(),
            Value::String(format_date(self.publication_date.as_ref())),
        );
        m.insert(
            "reading_time".to_owned(),
            Value::String(reading_time::estimate(&self.sections).to_string()),
        );
        m.insert(
            "sections".to_owned(),
            Value::Array(self.sections.iter().map(Section::to_value).collect()),
        );
        Value::Object(m)
    }
}

impl Section {
    fn to_value(&self) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("heading".to_owned(), text(&self.heading));
        m.insert("anchor".to_owned(), Value::String(slug::slugify(&self.heading)));
        m.insert("body".to_owned(), Value::String(self.body.as_html()));
        Value::Object(m)
    }
}

// gtmpl doesn't escape output; plain-text fields go in already escaped.
fn text(s: &str) -> Value {
    Value::String(escape_text(s))
}

/// Formats a publication date as `dd MMM yyyy` in Brazilian Portuguese,
/// lower-cased (e.g. `25 mar 2021`). Missing dates format as an empty string.
pub fn format_date(date: Option<&DateTime<FixedOffset>>) -> String {
    match date {
        Some(date) => date
            .format_localized("%d %b %Y", Locale::pt_BR)
            .to_string()
            .to_lowercase(),
        None => String::new(),
    }
}

/// Parses a content API timestamp. The API emits offsets without a colon
/// (`2021-03-25T19:25:28+0000`), so RFC 3339 is only the fallback.
pub fn parse_date(s: &str) -> chrono::ParseResult<DateTime<FixedOffset>> {
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(s))
}

fn deserialize_date<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(s) => parse_date(&s)
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid date `{}`: {}", s, e))),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
