//! Loads a [`Config`] from a project directory. A project is a directory
//! containing a `spacetraveling.yaml` project file and a `theme/` directory
//! with a `theme.yaml` file listing the template files, plus a `theme/static/`
//! directory of assets copied verbatim into the output.
//!
//! ```yaml
//! title: spacetraveling
//! site_root: https://blog.example.org/
//! author:
//!   name: Joseph Oliveira
//! api:
//!   endpoint: https://spacetraveling.cdn.prismic.io/api/v2
//!   document_type: posts
//!   page_size: 2
//! ```

use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file.
pub const PROJECT_FILE: &str = "spacetraveling.yaml";

/// The environment variable which, when set, overrides `api.access_token`.
pub const ACCESS_TOKEN_ENV: &str = "PRISMIC_ACCESS_TOKEN";

#[derive(Deserialize)]
struct PageSize(usize);
impl Default for PageSize {
    fn default() -> Self {
        PageSize(2)
    }
}

#[derive(Deserialize)]
struct DocumentType(String);
impl Default for DocumentType {
    fn default() -> Self {
        DocumentType(String::from("posts"))
    }
}

#[derive(Deserialize)]
struct HomePage(String);
impl Default for HomePage {
    fn default() -> Self {
        HomePage(String::from("index.html"))
    }
}

#[derive(Deserialize)]
struct Project {
    title: String,
    site_root: Url,

    #[serde(default)]
    home_page: HomePage,

    #[serde(default)]
    author: Option<Author>,

    api: Api,
}

#[derive(Deserialize)]
struct Api {
    endpoint: Url,

    #[serde(default)]
    access_token: Option<String>,

    #[serde(default)]
    document_type: DocumentType,

    #[serde(default)]
    page_size: PageSize,
}

#[derive(Deserialize)]
struct Theme {
    index_template: Vec<PathBuf>,
    posts_template: Vec<PathBuf>,
}

/// The site's author, credited in the Atom feed.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

/// Settings for the content API.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiConfig {
    /// The repository API endpoint.
    pub endpoint: Url,

    /// The token sent with every request, if the repository is private.
    pub access_token: Option<String>,

    /// The document type holding posts.
    pub document_type: String,

    /// The number of posts fetched per page, which is also the number of posts
    /// each "load more" step adds to the index.
    pub page_size: usize,
}

/// Everything needed to build a site.
pub struct Config {
    pub title: String,
    pub author: Option<Author>,
    pub api: ApiConfig,
    pub home_page: Url,
    pub index_url: Url,
    pub posts_url: Url,
    pub static_url: Url,
    pub atom_url: Url,
    pub index_template: Vec<PathBuf>,
    pub posts_template: Vec<PathBuf>,
    pub root_output_directory: PathBuf,
    pub index_output_directory: PathBuf,
    pub posts_output_directory: PathBuf,
    pub static_source_directory: PathBuf,
    pub static_output_directory: PathBuf,
}

impl Config {
    /// Searches `dir` and then each of its ancestors for a project file and
    /// loads the first one found.
    pub fn from_directory(dir: &Path, output_directory: &Path) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            Config::from_project_file(
                &path,
                output_directory,
                std::env::var(ACCESS_TOKEN_ENV).ok(),
            )
        } else {
            match dir.parent() {
                Some(parent) => Config::from_directory(parent, output_directory),
                None => Err(Error::ProjectFileNotFound),
            }
        }
    }

    /// Loads a project file. `access_token`, when given, takes precedence over
    /// the one in the file.
    pub fn from_project_file(
        path: &Path,
        output_directory: &Path,
        access_token: Option<String>,
    ) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path)?)
            .map_err(|err| Error::Yaml { path: path.to_owned(), err })?;
        let project_root = path
            .parent()
            .ok_or_else(|| Error::NoParentDirectory(path.to_owned()))?;

        let theme_dir = project_root.join("theme");
        let theme_path = theme_dir.join("theme.yaml");
        let theme: Theme = serde_yaml::from_reader(open(&theme_path)?)
            .map_err(|err| Error::Yaml { path: theme_path.clone(), err })?;

        if project.api.page_size.0 < 1 {
            return Err(Error::InvalidPageSize);
        }

        let site_root = with_trailing_slash(project.site_root);
        Ok(Config {
            title: project.title,
            author: project.author,
            api: ApiConfig {
                endpoint: project.api.endpoint,
                access_token: access_token.or(project.api.access_token),
                document_type: project.api.document_type.0,
                page_size: project.api.page_size.0,
            },
            home_page: site_root.join(&project.home_page.0)?,
            index_url: site_root.join("pages/")?,
            posts_url: site_root.join("post/")?,
            static_url: site_root.join("static/")?,
            atom_url: site_root.join("feed.atom")?,
            index_template: theme
                .index_template
                .iter()
                .map(|relpath| theme_dir.join(relpath))
                .collect(),
            posts_template: theme
                .posts_template
                .iter()
                .map(|relpath| theme_dir.join(relpath))
                .collect(),
            root_output_directory: output_directory.to_owned(),
            index_output_directory: output_directory.join("pages"),
            posts_output_directory: output_directory.join("post"),
            static_source_directory: theme_dir.join("static"),
            static_output_directory: output_directory.join("static"),
        })
    }
}

// Without the trailing slash, `Url::join` treats the last path segment as a
// file name and replaces it.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|err| Error::Open {
        path: path.to_owned(),
        err,
    })
}

/// The result of loading configuration.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading configuration.
#[derive(Debug)]
pub enum Error {
    /// Returned when no project file exists in the directory or any ancestor.
    ProjectFileNotFound,

    /// Returned when the project file has no parent directory.
    NoParentDirectory(PathBuf),

    /// Returned when a configuration file can't be opened.
    Open { path: PathBuf, err: std::io::Error },

    /// Returned when a configuration file isn't valid.
    Yaml { path: PathBuf, err: serde_yaml::Error },

    /// Returned when `api.page_size` is zero.
    InvalidPageSize,

    /// Returned when a site URL can't be derived from `site_root`.
    UrlParse(url::ParseError),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ProjectFileNotFound => write!(
                f,
                "Could not find `{}` in any parent directory",
                PROJECT_FILE
            ),
            Error::NoParentDirectory(path) => write!(
                f,
                "Can't get parent directory for project file '{}'",
                path.display()
            ),
            Error::Open { path, err } => {
                write!(f, "Opening '{}': {}", path.display(), err)
            }
            Error::Yaml { path, err } => {
                write!(f, "Loading '{}': {}", path.display(), err)
            }
            Error::InvalidPageSize => {
                write!(f, "`api.page_size` must be at least 1")
            }
            Error::UrlParse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { path: _, err } => Some(err),
            Error::Yaml { path: _, err } => Some(err),
            Error::UrlParse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator for URL joins.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}
