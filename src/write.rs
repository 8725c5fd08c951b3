use crate::post::{PostDetail, PostSummary};
use crate::richtext::escape_text;
use gtmpl::{Template, Value};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

/// The posts shown on the index pages. Index page `i` shows the first
/// `steps[i]` posts, i.e. the list as it stood after `i` "load more" steps.
pub struct Listing<'a> {
    pub posts: &'a [PostSummary],
    pub steps: &'a [usize],

    /// The message of a failed "load more" step, shown (escaped) on the last
    /// index page.
    pub notice: Option<&'a str>,
}

/// A post's output file name along with its contents.
pub type PostFile = (String, PostDetail);

/// Responsible for templating and writing HTML pages to disk.
pub struct Writer<'a> {
    /// The template for post pages.
    pub posts_template: &'a Template,

    /// The template for index pages.
    pub index_template: &'a Template,

    /// The base URL for index pages. The index pages will be located at
    /// `{index_base_url}/index.html`, `{index_base_url}/1.html`, etc.
    pub index_base_url: &'a Url,

    /// The directory in which the index HTML files will be written.
    pub index_output_directory: &'a Path,

    /// The base URL for post pages. A post is located at
    /// `{posts_base_url}/{file_name}`.
    pub posts_base_url: &'a Url,

    /// The directory in which the post HTML files will be written.
    pub posts_output_directory: &'a Path,

    /// The site title, available to all templates as `title` (escaped).
    pub title: &'a str,

    /// The URL for the site's home page, available to all templates as
    /// `home_page`.
    pub home_page: &'a Url,

    /// The URL for the static assets, available to all templates as
    /// `static_url`.
    pub static_url: &'a Url,

    /// The URL for the Atom feed, available to all templates as `atom_url`.
    pub atom_url: &'a Url,
}

impl<'a> Writer<'a> {
    /// Takes a single [`Page`], templates it, and writes it to disk.
    fn write_page(&self, page: &Page) -> Result<()> {
        let mut value = page.to_value();
        if let Value::Object(obj) = &mut value {
            obj.insert("title".to_owned(), Value::String(escape_text(self.title)));
            obj.insert(
                "home_page".to_owned(),
                Value::String(self.home_page.to_string()),
            );
            obj.insert(
                "static_url".to_owned(),
                Value::String(self.static_url.to_string()),
            );
            obj.insert(
                "atom_url".to_owned(),
                Value::String(self.atom_url.to_string()),
            );
        }
        let context = gtmpl::Context::from(value)
            .map_err(|e| Error::Template(e.to_string()))?;
        page.template
            .execute(&mut std::fs::File::create(&page.file_path)?, &context)
            .map_err(|e| Error::Template(e.to_string()))?;
        Ok(())
    }

    /// Writes the index pages for `listing` and a page for each post in
    /// `posts`.
    pub fn write_site(&self, listing: &Listing, posts: &[PostFile]) -> Result<()> {
        use std::collections::HashSet;
        let mut seen_dirs: HashSet<PathBuf> = HashSet::new();
        let mut pages = self.index_pages(listing)?;
        pages.extend(self.post_pages(posts)?);
        for page in &pages {
            if let Some(dir) = page.file_path.parent() {
                if seen_dirs.insert(dir.to_owned()) {
                    std::fs::create_dir_all(dir)?;
                }
            }
            self.write_page(page)?;
        }
        Ok(())
    }

    /// The URL of the post page for `post`, if it has one.
    pub fn post_url(&self, post: &PostSummary) -> Result<Option<Url>> {
        match post.file_name() {
            Some(file_name) => Ok(Some(self.posts_base_url.join(&file_name)?)),
            None => Ok(None),
        }
    }

    /// Creates one index [`Page`] per "load more" step of `listing`. Each page
    /// links to the previous step as `prev` and to the next one as `next`
    /// (the "load more" link).
    fn index_pages(&self, listing: &Listing) -> Result<Vec<Page<'a>>> {
        let total_pages = listing.steps.len();
        let mut pages = Vec::with_capacity(total_pages);
        for (i, &shown) in listing.steps.iter().enumerate() {
            let mut posts = Vec::with_capacity(shown);
            for post in &listing.posts[..shown.min(listing.posts.len())] {
                posts.push(post.to_value(self.post_url(post)?.as_ref()));
            }
            let last = i + 1 == total_pages;

            let mut item: HashMap<String, Value> = HashMap::new();
            item.insert("posts".to_owned(), Value::Array(posts));
            item.insert(
                "notice".to_owned(),
                match (last, listing.notice) {
                    (true, Some(notice)) => Value::String(escape_text(notice)),
                    _ => Value::Nil,
                },
            );

            pages.push(Page {
                item: Value::Object(item),
                file_path: self.index_output_directory.join(index_file_name(i)),
                prev: match i {
                    0 => None,
                    _ => Some(self.index_base_url.join(&index_file_name(i - 1))?),
                },
                next: match last {
                    true => None,
                    false => Some(self.index_base_url.join(&index_file_name(i + 1))?),
                },
                template: self.index_template,
            });
        }
        Ok(pages)
    }

    /// Creates all of the post [`Page`]s, each linked to its neighbours.
    fn post_pages(&self, posts: &[PostFile]) -> Result<Vec<Page<'a>>> {
        let urls = posts
            .iter()
            .map(|(file_name, _)| self.posts_base_url.join(file_name))
            .collect::<std::result::Result<Vec<Url>, _>>()?;
        Ok(posts
            .iter()
            .enumerate()
            .map(|(i, (file_name, detail))| Page {
                item: detail.to_value(),
                file_path: self.posts_output_directory.join(file_name),
                prev: match i {
                    0 => None,
                    _ => Some(urls[i - 1].clone()),
                },
                next: urls.get(i + 1).cloned(),
                template: self.posts_template,
            })
            .collect())
    }
}

fn index_file_name(i: usize) -> String {
    match i {
        0 => String::from("index.html"),
        _ => format!("{}.html", i),
    }
}

/// An object representing an output HTML file. A [`Page`] can be converted to a
/// [`Value`] and thus rendered in a template via [`Page::to_value`].
struct Page<'a> {
    /// The main item for the page.
    item: Value,

    /// The target location on disk for the output file.
    file_path: PathBuf,

    /// The URL for the previous page, if any.
    prev: Option<Url>,

    /// The URL for the next page, if any.
    next: Option<Url>,

    /// The template with which the page will be rendered.
    template: &'a Template,
}

impl Page<'_> {
    /// Converts a [`Page`] into a [`Value`]. The result is a [`Value::Object`]
    /// with fields `item`, `prev`, and `next` (see [`Page`] for descriptions).
    fn to_value(&self) -> Value {
        let option_to_value = |opt: &Option<Url>| match opt {
            Some(url) => Value::String(url.to_string()),
            None => Value::Nil,
        };

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("item".to_owned(), self.item.clone());
        m.insert("prev".to_owned(), option_to_value(&self.prev));
        m.insert("next".to_owned(), option_to_value(&self.next));
        Value::Object(m)
    }
}

/// The result of a fallible page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug)]
pub enum Error {
    /// An error during templating.
    Template(String),

    /// An error building page URLs.
    UrlParse(url::ParseError),

    /// An error writing the output files.
    Io(io::Error),
}

impl From<io::Error> for Error {
    /// Converts an [`io::Error`] into an [`Error`]. This allows us to use the
    /// `?` operator for fallible I/O operations.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. This allows us to use
    /// the `?` operator for URL joins.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template(err) => err.fmt(f),
            Error::UrlParse(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template(_) => None,
            Error::UrlParse(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}
