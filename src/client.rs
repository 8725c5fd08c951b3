//! Defines the [`ContentSource`] trait through which posts are fetched, and
//! [`PrismicClient`], its implementation over the Prismic REST API.

use crate::pagination::PaginatedResult;
use crate::post::{PostDetail, PostSummary};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use tracing::debug;
use url::Url;

/// A source of posts.
pub trait ContentSource {
    /// Fetches the first page of documents of `document_type`, with at most
    /// `page_size` documents per page.
    fn get_page(
        &self,
        document_type: &str,
        page_size: usize,
    ) -> Result<PaginatedResult<PostSummary>>;

    /// Fetches the page referred to by a [`PaginatedResult::next_page`]
    /// token.
    fn get_next_page(&self, token: &str) -> Result<PaginatedResult<PostSummary>>;

    /// Fetches a single document of `document_type` by its identifier.
    fn get_by_uid(&self, document_type: &str, uid: &str) -> Result<PostDetail>;
}

/// A [`ContentSource`] backed by a Prismic repository. All queries are made
/// against the repository's master ref, which is resolved once by
/// [`PrismicClient::connect`].
pub struct PrismicClient {
    http: Client,
    endpoint: Url,
    access_token: Option<String>,
    master_ref: String,
}

impl PrismicClient {
    /// Connects to the repository API at `endpoint` (e.g.
    /// `https://my-repo.cdn.prismic.io/api/v2`) and resolves its master ref.
    pub fn connect(endpoint: Url, access_token: Option<String>) -> Result<PrismicClient> {
        let mut client = PrismicClient {
            http: Client::new(),
            endpoint,
            access_token,
            master_ref: String::new(),
        };
        let info: ApiInfo = client.get_json(client.authorized(client.endpoint.clone()))?;
        client.master_ref = info.master_ref()?;
        debug!(master_ref = %client.master_ref, "resolved master ref");
        Ok(client)
    }

    fn search(&self, query: &str, page_size: Option<usize>) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidEndpoint(self.endpoint.clone()))?
            .pop_if_empty()
            .extend(&["documents", "search"]);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("ref", &self.master_ref);
            pairs.append_pair("q", query);
            if let Some(page_size) = page_size {
                pairs.append_pair("pageSize", &page_size.to_string());
            }
        }
        Ok(self.authorized(url))
    }

    fn authorized(&self, mut url: Url) -> Url {
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("access_token", token);
        }
        url
    }

    fn get_json<T: DeserializeOwned>(&self, mut url: Url) -> Result<T> {
        // the query string may carry the access token
        debug!(host = ?url.host_str(), path = url.path(), "GET");
        let response = self.http.get(url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            url.set_query(None);
            return Err(Error::Status { url, status });
        }
        Ok(serde_json::from_str(&response.text()?)?)
    }
}

impl ContentSource for PrismicClient {
    fn get_page(
        &self,
        document_type: &str,
        page_size: usize,
    ) -> Result<PaginatedResult<PostSummary>> {
        let query = format!("[[at(document.type,\"{}\")]]", quote(document_type));
        let response: SearchResponse<PostSummary> =
            self.get_json(self.search(&query, Some(page_size))?)?;
        Ok(response.into())
    }

    fn get_next_page(&self, token: &str) -> Result<PaginatedResult<PostSummary>> {
        let response: SearchResponse<PostSummary> = self.get_json(Url::parse(token)?)?;
        Ok(response.into())
    }

    fn get_by_uid(&self, document_type: &str, uid: &str) -> Result<PostDetail> {
        let query = format!(
            "[[at(my.{}.uid,\"{}\")]]",
            document_type,
            quote(uid)
        );
        let response: SearchResponse<PostDetail> =
            self.get_json(self.search(&query, Some(1))?)?;
        response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound {
                document_type: document_type.to_owned(),
                uid: uid.to_owned(),
            })
    }
}

fn quote(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Parses a search response body into a page of summaries.
pub fn parse_page(body: &str) -> Result<PaginatedResult<PostSummary>> {
    let response: SearchResponse<PostSummary> = serde_json::from_str(body)?;
    Ok(response.into())
}

#[derive(Deserialize)]
struct SearchResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,

    #[serde(default)]
    next_page: Option<String>,
}

impl<T> From<SearchResponse<T>> for PaginatedResult<T> {
    fn from(response: SearchResponse<T>) -> PaginatedResult<T> {
        PaginatedResult::new(response.results, response.next_page)
    }
}

#[derive(Deserialize)]
struct ApiInfo {
    #[serde(default)]
    refs: Vec<Ref>,
}

#[derive(Deserialize)]
struct Ref {
    #[serde(rename = "ref")]
    reference: String,

    #[serde(default, rename = "isMasterRef")]
    is_master_ref: bool,
}

impl ApiInfo {
    fn master_ref(self) -> Result<String> {
        self.refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference)
            .ok_or(Error::MissingMasterRef)
    }
}

/// The result of a fallible content API operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to fetch content.
#[derive(Debug)]
pub enum Error {
    /// Returned when the request couldn't be made or its body couldn't be
    /// read.
    Http(reqwest::Error),

    /// Returned when the API answers with a non-success status.
    Status { url: Url, status: StatusCode },

    /// Returned when a response body isn't the expected JSON.
    Json(serde_json::Error),

    /// Returned when a next-page token isn't a valid URL.
    UrlParse(url::ParseError),

    /// Returned when the configured endpoint can't have a path appended.
    InvalidEndpoint(Url),

    /// Returned when the API doesn't advertise a master ref.
    MissingMasterRef,

    /// Returned when no document has the requested identifier.
    NotFound { document_type: String, uid: String },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Http(err) => err.fmt(f),
            Error::Status { url, status } => {
                write!(f, "GET {}: {}", url, status)
            }
            Error::Json(err) => write!(f, "malformed response: {}", err),
            Error::UrlParse(err) => write!(f, "invalid page token: {}", err),
            Error::InvalidEndpoint(url) => {
                write!(f, "invalid API endpoint `{}`", url)
            }
            Error::MissingMasterRef => {
                write!(f, "API response has no master ref")
            }
            Error::NotFound { document_type, uid } => {
                write!(f, "no `{}` document with uid `{}`", document_type, uid)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::UrlParse(err) => Some(err),
            Error::Status { .. } => None,
            Error::InvalidEndpoint(_) => None,
            Error::MissingMasterRef => None,
            Error::NotFound { .. } => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    /// Converts a [`reqwest::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator on requests. The request URL is dropped since its
    /// query string may carry the access token.
    fn from(err: reqwest::Error) -> Error {
        Error::Http(err.without_url())
    }
}

impl From<serde_json::Error> for Error {
    /// Converts a [`serde_json::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when decoding responses.
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator when parsing page tokens.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}
