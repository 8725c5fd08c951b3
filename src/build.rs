//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: fetching the posts
//! ([`crate::client`]), rendering index and post pages ([`crate::write`]),
//! copying the static source directory into the static output directory, and
//! generating the Atom feed.

use crate::client::{ContentSource, Error as ContentError, PrismicClient};
use crate::config::Config;
use crate::feed::{Error as FeedError, *};
use crate::pagination::{reduce, Action, PaginatedResult, PostListState};
use crate::post::PostSummary;
use crate::write::{Error as WriteError, *};
use gtmpl::Template;
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Builds the site from a [`Config`] object, fetching posts from the
/// configured Prismic repository. See [`build_site_from`].
pub fn build_site(config: Config) -> Result<()> {
    let client = PrismicClient::connect(
        config.api.endpoint.clone(),
        config.api.access_token.clone(),
    )?;
    build_site_from(&config, &client)
}

/// Builds the site from posts provided by `source`. The first page of posts
/// must be fetched successfully; after that, pages are loaded one "load more"
/// step at a time until there are none left or a fetch fails, in which case
/// the failure is logged and shown on the last index page.
pub fn build_site_from<S: ContentSource>(config: &Config, source: &S) -> Result<()> {
    let document_type = &config.api.document_type;
    info!(%document_type, page_size = config.api.page_size, "fetching posts");
    let first = source.get_page(document_type, config.api.page_size)?;
    let (state, steps) = load_all(source, first);
    if let Some(notice) = &state.notice {
        warn!(%notice, "stopped loading posts");
    }
    let posts = &state.result.items;
    info!(posts = posts.len(), index_pages = steps.len(), "fetched posts");

    // Parse the template files.
    let index_template = parse_template(config.index_template.iter())?;
    let posts_template = parse_template(config.posts_template.iter())?;

    let writer = Writer {
        posts_template: &posts_template,
        index_template: &index_template,
        index_base_url: &config.index_url,
        index_output_directory: &config.index_output_directory,
        posts_base_url: &config.posts_url,
        posts_output_directory: &config.posts_output_directory,
        title: &config.title,
        home_page: &config.home_page,
        static_url: &config.static_url,
        atom_url: &config.atom_url,
    };

    // fetch the full contents of every post with a page
    let mut post_files: Vec<PostFile> = Vec::new();
    let mut feed_posts = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for post in posts {
        match (post.file_name(), writer.post_url(post)?) {
            (Some(file_name), Some(url)) => {
                if !seen.insert(file_name.clone()) {
                    continue;
                }
                debug!(uid = %post.identifier, "fetching post");
                let detail = source.get_by_uid(document_type, &post.identifier)?;
                post_files.push((file_name, detail));
                feed_posts.push((post, url));
            }
            _ => warn!(title = %post.title, "post has no identifier, skipping its page"),
        }
    }

    // Blow away the old output directories so we don't have any collisions.
    // The root output directory itself is left alone in case the user passed
    // the wrong directory.
    rmdir(&config.posts_output_directory)?;
    rmdir(&config.index_output_directory)?;
    rmdir(&config.static_output_directory)?;

    writer.write_site(
        &Listing {
            posts,
            steps: &steps,
            notice: state.notice.as_deref(),
        },
        &post_files,
    )?;

    copy_dir(
        &config.static_source_directory,
        &config.static_output_directory,
    )?;

    // copy /pages/index.html to /index.html
    std::fs::copy(
        config.index_output_directory.join("index.html"),
        config.root_output_directory.join("index.html"),
    )?;

    write_feed(
        FeedConfig {
            title: config.title.clone(),
            id: config.home_page.to_string(),
            author: config.author.clone(),
            home_page: config.home_page.clone(),
        },
        &feed_posts,
        File::create(config.root_output_directory.join("feed.atom"))?,
    )?;

    info!(
        output = %config.root_output_directory.display(),
        post_pages = post_files.len(),
        "site built"
    );
    Ok(())
}

/// Drives "load more" steps from `first` until no pages remain or a fetch
/// fails. Returns the final state along with the number of posts shown after
/// each step (starting with the first page).
pub fn load_all<S: ContentSource>(
    source: &S,
    first: PaginatedResult<PostSummary>,
) -> (PostListState<PostSummary>, Vec<usize>) {
    let mut steps = vec![first.items.len()];
    let mut state = PostListState::new(first);
    loop {
        state = reduce(state, Action::LoadMore);
        let token = match state.pending() {
            Some(token) => token.to_owned(),
            None => break,
        };
        debug!(next_page = %token, "loading more posts");
        match source.get_next_page(&token) {
            Ok(page) => {
                state = reduce(state, Action::Loaded(page));
                steps.push(state.result.items.len());
            }
            Err(err) => {
                state = reduce(
                    state,
                    Action::Failed(format!("An unexpected error has occurred. {}", err)),
                );
                break;
            }
        }
    }
    (state, steps)
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_dir() {
        info!(path = %src.display(), "no static directory, skipping");
        return Ok(());
    }
    for entry in walkdir::WalkDir::new(src) {
        let entry = entry?;
        // every entry is beneath `src`
        let relative = match entry.path().strip_prefix(src) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

// Concatenates the template files and parses the result into a single
// template.
fn parse_template<P: AsRef<Path>>(template_files: impl Iterator<Item = P>) -> Result<Template> {
    let mut contents = String::new();
    for template_file in template_files {
        use std::io::Read;
        let template_file = template_file.as_ref();
        File::open(template_file)
            .map_err(|e| Error::OpenTemplateFile {
                path: template_file.to_owned(),
                err: e,
            })?
            .read_to_string(&mut contents)?;
        contents.push(' ');
    }

    let mut template = Template::default();
    template
        .parse(&contents)
        .map_err(|e| Error::ParseTemplate(e.to_string()))?;
    Ok(template)
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during fetching, writing,
/// cleaning output directories, parsing template files, and other I/O.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors fetching posts.
    Content(ContentError),

    /// Returned for errors writing pages to disk as HTML files.
    Write(WriteError),

    /// Returned for I/O problems while cleaning output directories.
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned for I/O problems while opening template files.
    OpenTemplateFile { path: PathBuf, err: std::io::Error },

    /// Returned for errors parsing template files.
    ParseTemplate(String),

    /// Returned for errors writing the feed.
    Feed(FeedError),

    /// Returned for errors walking the static directory.
    WalkDir(walkdir::Error),

    /// Returned for other I/O errors.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Content(err) => write!(f, "Fetching posts: {}", err),
            Error::Write(err) => err.fmt(f),
            Error::Clean { path, err } => {
                write!(f, "Cleaning directory '{}': {}", path.display(), err)
            }
            Error::OpenTemplateFile { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::ParseTemplate(err) => err.fmt(f),
            Error::Feed(err) => err.fmt(f),
            Error::WalkDir(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Content(err) => Some(err),
            Error::Write(err) => Some(err),
            Error::Clean { path: _, err } => Some(err),
            Error::OpenTemplateFile { path: _, err } => Some(err),
            Error::ParseTemplate(_) => None,
            Error::Feed(err) => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<ContentError> for Error {
    /// Converts [`ContentError`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: ContentError) -> Error {
        Error::Content(err)
    }
}

impl From<WriteError> for Error {
    /// Converts [`WriteError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: WriteError) -> Error {
        Error::Write(err)
    }
}

impl From<FeedError> for Error {
    /// Converts [`FeedError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: FeedError) -> Error {
        Error::Feed(err)
    }
}

impl From<walkdir::Error> for Error {
    /// Converts [`walkdir::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

fn rmdir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::Result as ContentResult;
    use crate::config::ApiConfig;
    use crate::post::PostDetail;
    use reqwest::StatusCode;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;
    use url::Url;

    /// Serves pages from memory. Tokens missing from `pages` fail.
    struct FakeSource {
        first: PaginatedResult<PostSummary>,
        pages: HashMap<String, PaginatedResult<PostSummary>>,
        requested: RefCell<Vec<String>>,
    }

    impl ContentSource for FakeSource {
        fn get_page(&self, _: &str, _: usize) -> ContentResult<PaginatedResult<PostSummary>> {
            Ok(self.first.clone())
        }

        fn get_next_page(&self, token: &str) -> ContentResult<PaginatedResult<PostSummary>> {
            self.requested.borrow_mut().push(token.to_owned());
            self.pages.get(token).cloned().ok_or_else(|| ContentError::Status {
                url: Url::parse("https://repo.example.org/api/v2/documents/search").unwrap(),
                status: StatusCode::SERVICE_UNAVAILABLE,
            })
        }

        fn get_by_uid(&self, document_type: &str, uid: &str) -> ContentResult<PostDetail> {
            let post = self
                .all()
                .into_iter()
                .find(|p| p.identifier == uid)
                .ok_or_else(|| ContentError::NotFound {
                    document_type: document_type.to_owned(),
                    uid: uid.to_owned(),
                })?;
            Ok(PostDetail {
                publication_date: post.publication_date,
                title: post.title,
                banner_url: String::from("https://images.example.org/banner.png"),
                author: post.author,
                sections: Vec::new(),
            })
        }
    }

    impl FakeSource {
        fn new(first: PaginatedResult<PostSummary>, pages: &[(&str, PaginatedResult<PostSummary>)]) -> Self {
            FakeSource {
                first,
                pages: pages
                    .iter()
                    .map(|(token, page)| (token.to_string(), page.clone()))
                    .collect(),
                requested: RefCell::new(Vec::new()),
            }
        }

        fn all(&self) -> Vec<PostSummary> {
            let mut all = self.first.items.clone();
            for page in self.pages.values() {
                all.extend(page.items.iter().cloned());
            }
            all
        }
    }

    fn summary(identifier: &str) -> PostSummary {
        PostSummary {
            identifier: identifier.to_owned(),
            publication_date: None,
            title: identifier.to_uppercase(),
            subtitle: String::new(),
            author: String::from("Joseph Oliveira"),
        }
    }

    fn page(ids: &[&str], next_page: Option<&str>) -> PaginatedResult<PostSummary> {
        PaginatedResult::new(
            ids.iter().map(|id| summary(id)).collect(),
            next_page.map(str::to_owned),
        )
    }

    #[test]
    fn test_load_all_until_exhausted() {
        let source = FakeSource::new(
            page(&["a", "b"], Some("p2")),
            &[("p2", page(&["c", "d"], Some("p3"))), ("p3", page(&["e"], None))],
        );
        let (state, steps) = load_all(&source, source.first.clone());
        assert_eq!(vec![2, 4, 5], steps);
        assert_eq!(5, state.result.items.len());
        assert_eq!(None, state.notice);
        assert!(!state.in_flight);
        assert_eq!(vec!["p2", "p3"], *source.requested.borrow());
    }

    #[test]
    fn test_load_all_stops_on_failure() {
        let source = FakeSource::new(
            page(&["a", "b"], Some("p2")),
            &[("p2", page(&["c"], Some("broken")))],
        );
        let (state, steps) = load_all(&source, source.first.clone());
        assert_eq!(vec![2, 3], steps);
        assert_eq!(Some(String::from("broken")), state.result.next_page);
        let notice = state.notice.unwrap();
        assert!(notice.starts_with("An unexpected error has occurred."));
        assert!(notice.contains("503"));
    }

    #[test]
    fn test_load_all_single_page() {
        let source = FakeSource::new(page(&["a"], None), &[]);
        let (state, steps) = load_all(&source, source.first.clone());
        assert_eq!(vec![1], steps);
        assert!(source.requested.borrow().is_empty());
        assert!(!state.can_load_more());
    }

    fn config(project: &Path, out: &Path) -> Config {
        let site_root = Url::parse("https://example.org/").unwrap();
        let theme = project.join("theme");
        Config {
            title: String::from("spacetraveling"),
            author: None,
            api: ApiConfig {
                endpoint: Url::parse("https://repo.example.org/api/v2").unwrap(),
                access_token: None,
                document_type: String::from("posts"),
                page_size: 2,
            },
            home_page: site_root.join("index.html").unwrap(),
            index_url: site_root.join("pages/").unwrap(),
            posts_url: site_root.join("post/").unwrap(),
            static_url: site_root.join("static/").unwrap(),
            atom_url: site_root.join("feed.atom").unwrap(),
            index_template: vec![theme.join("index.html")],
            posts_template: vec![theme.join("post.html")],
            root_output_directory: out.to_owned(),
            index_output_directory: out.join("pages"),
            posts_output_directory: out.join("post"),
            static_source_directory: theme.join("static"),
            static_output_directory: out.join("static"),
        }
    }

    #[test]
    fn test_build_site_from() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let project = tempfile::tempdir()?;
        let out = tempfile::tempdir()?;
        let theme = project.path().join("theme");
        fs::create_dir_all(theme.join("static").join("css"))?;
        fs::write(theme.join("index.html"), "{{range .item.posts}}{{.title}} {{end}}")?;
        fs::write(theme.join("post.html"), "{{.item.title}} by {{.item.author}}")?;
        fs::write(theme.join("static").join("css").join("style.css"), "body {}")?;

        let source = FakeSource::new(
            page(&["a", "", "b"], Some("p2")),
            &[("p2", page(&["c", "a"], None))],
        );
        build_site_from(&config(project.path(), out.path()), &source)?;

        // template files are joined with a trailing space
        let read = |path: &str| fs::read_to_string(out.path().join(path));
        assert_eq!("A  B  ", read("pages/index.html")?);
        assert_eq!("A  B C A  ", read("pages/1.html")?);
        assert_eq!(read("pages/index.html")?, read("index.html")?);
        assert_eq!("C by Joseph Oliveira ", read("post/c.html")?);
        assert!(out.path().join("post/a.html").is_file());
        assert!(out.path().join("post/b.html").is_file());
        assert_eq!("body {}", read("static/css/style.css")?);
        assert!(read("feed.atom")?.contains("https://example.org/post/b.html"));
        Ok(())
    }

    #[test]
    fn test_build_site_fails_on_missing_post() -> std::io::Result<()> {
        struct Missing;
        impl ContentSource for Missing {
            fn get_page(&self, _: &str, _: usize) -> ContentResult<PaginatedResult<PostSummary>> {
                Ok(page(&["ghost"], None))
            }
            fn get_next_page(&self, _: &str) -> ContentResult<PaginatedResult<PostSummary>> {
                Ok(page(&[], None))
            }
            fn get_by_uid(&self, document_type: &str, uid: &str) -> ContentResult<PostDetail> {
                Err(ContentError::NotFound {
                    document_type: document_type.to_owned(),
                    uid: uid.to_owned(),
                })
            }
        }

        let project = tempfile::tempdir()?;
        let out = tempfile::tempdir()?;
        let theme = project.path().join("theme");
        fs::create_dir_all(&theme)?;
        fs::write(theme.join("index.html"), "")?;
        fs::write(theme.join("post.html"), "")?;

        let result = build_site_from(&config(project.path(), out.path()), &Missing);
        assert!(matches!(
            result,
            Err(Error::Content(ContentError::NotFound { .. }))
        ));
        Ok(())
    }
}
