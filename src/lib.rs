//! The library code for the `spacetraveling` static blog generator. Posts live
//! in a headless CMS and the build is broken down into two distinct steps:
//!
//! 1. Fetching posts from the content API ([`crate::client`])
//! 2. Converting the posts into output files on disk ([`crate::write`])
//!
//! The content API returns posts a page at a time. The index of the site
//! mirrors that: its first page shows the first page of posts, and each
//! following index page shows everything loaded so far after one more "load
//! more" step ([`crate::pagination`]). Each post gets a page of its own with
//! its body rendered from structured text ([`crate::richtext`]) and an
//! estimated reading time ([`crate::reading_time`]).

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod client;
pub mod config;
pub mod feed;
pub mod pagination;
pub mod post;
pub mod reading_time;
pub mod richtext;
pub mod write;
