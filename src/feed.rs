//! Support for creating Atom feeds from a list of posts.

use crate::config::Author;
use crate::post::PostSummary;
use atom_syndication::{Entry, Error as AtomError, Feed, Link, Person, Text};
use chrono::{DateTime, FixedOffset, Utc};
use std::fmt;
use std::io::Write;
use url::Url;

type FixedDateTime = DateTime<FixedOffset>;

/// Bundled configuration for creating a feed.
pub struct FeedConfig {
    pub title: String,
    pub id: String,
    pub author: Option<Author>,
    pub home_page: Url,
}

/// Creates a feed from some configuration ([`FeedConfig`]) and a list of
/// posts with their page URLs and writes the result to a [`std::io::Write`].
pub fn write_feed<W: Write>(
    config: FeedConfig,
    posts: &[(&PostSummary, Url)],
    w: W,
) -> Result<()> {
    feed(config, posts).write_to(w)?;
    Ok(())
}

fn feed(config: FeedConfig, posts: &[(&PostSummary, Url)]) -> Feed {
    let now: FixedDateTime = Utc::now().into();
    let mut feed = Feed::default();
    feed.set_updated(
        posts
            .iter()
            .filter_map(|(post, _)| post.publication_date)
            .max()
            .unwrap_or(now),
    );
    feed.set_entries(feed_entries(&config, posts, now));
    feed.set_authors(author_to_people(config.author.as_ref()));
    feed.set_links(vec![alternate(config.home_page.as_str())]);
    feed.set_title(config.title);
    feed.set_id(config.id);
    feed
}

fn feed_entries(
    config: &FeedConfig,
    posts: &[(&PostSummary, Url)],
    now: FixedDateTime,
) -> Vec<Entry> {
    let mut entries: Vec<Entry> = Vec::with_capacity(posts.len());
    for (post, url) in posts {
        let date = post.publication_date.unwrap_or(now);
        let mut entry = Entry::default();
        entry.set_id(url.to_string());
        entry.set_title(post.title.clone());
        entry.set_updated(date);
        entry.set_published(post.publication_date);
        entry.set_summary(Some(Text::from(post.subtitle.clone())));
        entry.set_links(vec![alternate(url.as_str())]);
        entry.set_authors(match &config.author {
            Some(author) => author_to_people(Some(author)),
            None if !post.author.is_empty() => {
                let mut person = Person::default();
                person.set_name(post.author.clone());
                vec![person]
            }
            None => Vec::new(),
        });
        entries.push(entry);
    }
    entries
}

fn alternate(href: &str) -> Link {
    let mut link = Link::default();
    link.set_href(href);
    link.set_rel("alternate");
    link
}

fn author_to_people(author: Option<&Author>) -> Vec<Person> {
    match author {
        Some(author) => {
            let mut person = Person::default();
            person.set_name(author.name.clone());
            person.set_email(author.email.clone());
            vec![person]
        }
        None => Vec::new(),
    }
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed. Variants inlude I/O and Atom issues.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is a generic I/O error.
    Io(std::io::Error),

    /// Returned when there is an Atom-related error.
    Atom(AtomError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Atom(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Atom(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator in fallible feed operations.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}
