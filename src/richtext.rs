//! Defines [`RichText`], the structured-text format the content API uses for
//! post bodies. A document is a list of [`Block`]s (paragraphs, headings, list
//! items, images, ...) whose inline formatting is described by [`Span`]s
//! addressing character ranges of the block text. Documents can be rendered
//! either as plain text ([`RichText::as_text`], used for reading-time
//! estimates) or as HTML ([`RichText::as_html`], used for post pages).
//!
//! Deserialization never fails: a body that isn't a JSON array yields an empty
//! document and array elements that aren't recognizable blocks are skipped.

use pulldown_cmark::escape::{escape_href, escape_html, StrWrite};
use serde::{Deserialize, Deserializer};
use serde_json::Value as Json;
use std::io;

/// A structured-text document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RichText(pub Vec<Block>);

/// A single block-level element of a [`RichText`] document.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Block {
    /// The block type, e.g. `paragraph`, `heading2`, `list-item`, `image`.
    #[serde(rename = "type")]
    pub kind: String,

    /// The block's text. Absent for `image` and `embed` blocks.
    #[serde(default)]
    pub text: Option<String>,

    /// Inline formatting applied to `text`. Spans which don't parse are
    /// dropped without affecting the rest of the block.
    #[serde(default, deserialize_with = "lenient_spans")]
    pub spans: Vec<Span>,

    /// The image source for `image` blocks.
    #[serde(default)]
    pub url: Option<String>,

    /// The alternative text for `image` blocks.
    #[serde(default)]
    pub alt: Option<String>,

    /// The provider payload for `embed` blocks.
    #[serde(default)]
    pub oembed: Option<Embed>,
}

/// Inline formatting over the character range `start..end` of a block's text.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,

    /// One of `strong`, `em`, `hyperlink` or `label`. Other kinds are ignored
    /// when rendering.
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub data: Option<SpanData>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SpanData {
    /// Destination of a `hyperlink` span.
    #[serde(default)]
    pub url: Option<String>,

    /// Link target of a `hyperlink` span (e.g. `_blank`).
    #[serde(default)]
    pub target: Option<String>,

    /// Class name of a `label` span.
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub embed_url: String,

    #[serde(default, rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub html: Option<String>,
}

impl RichText {
    /// Builds a document from arbitrary JSON, keeping only the array elements
    /// which parse as [`Block`]s.
    pub fn from_json(value: Json) -> RichText {
        match value {
            Json::Array(items) => RichText(
                items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value(item).ok())
                    .collect(),
            ),
            _ => RichText::default(),
        }
    }

    /// Renders the document as plain text: the text of every text-bearing
    /// block joined by a single space.
    pub fn as_text(&self) -> String {
        self.0
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<&str>>()
            .join(" ")
    }

    /// Renders the document as an HTML string.
    pub fn as_html(&self) -> String {
        let mut out = String::new();
        // writes into a `String` can't fail
        let _ = self.push_html(&mut out);
        out
    }

    /// Renders the document as HTML into `w`. Consecutive list items are
    /// grouped into a single `<ul>` or `<ol>`.
    pub fn push_html<W: StrWrite>(&self, w: &mut W) -> io::Result<()> {
        let mut list: Option<&str> = None;
        for block in &self.0 {
            let wanted = match block.kind.as_str() {
                "list-item" => Some("ul"),
                "o-list-item" => Some("ol"),
                _ => None,
            };
            if list != wanted {
                if let Some(tag) = list {
                    write!(w, "</{}>", tag)?;
                }
                if let Some(tag) = wanted {
                    write!(w, "<{}>", tag)?;
                }
                list = wanted;
            }
            push_block(w, block)?;
        }
        if let Some(tag) = list {
            write!(w, "</{}>", tag)?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for RichText {
    /// Deserializes leniently; see [`RichText::from_json`].
    fn deserialize<D>(deserializer: D) -> Result<RichText, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(RichText::from_json(Json::deserialize(deserializer)?))
    }
}

fn lenient_spans<'de, D>(deserializer: D) -> Result<Vec<Span>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Json::deserialize(deserializer)? {
        Json::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Escapes plain text for inclusion in HTML, inside elements or quoted
/// attribute values.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    // writes into a `String` can't fail
    let _ = escape_html(&mut out, s);
    out
}

fn push_block<W: StrWrite>(w: &mut W, block: &Block) -> io::Result<()> {
    let tag = match block.kind.as_str() {
        "image" => return push_image(w, block),
        "embed" => return push_embed(w, block),
        "preformatted" => String::from("pre"),
        "list-item" | "o-list-item" => String::from("li"),
        kind => match kind.strip_prefix("heading") {
            Some(level @ ("1" | "2" | "3" | "4" | "5" | "6")) => {
                format!("h{}", level)
            }
            _ => String::from("p"),
        },
    };
    let text = match &block.text {
        Some(text) => text,
        None => return Ok(()),
    };
    write!(w, "<{}>", tag)?;
    push_spans(w, text, &block.spans)?;
    write!(w, "</{}>", tag)
}

fn push_image<W: StrWrite>(w: &mut W, block: &Block) -> io::Result<()> {
    let url = match &block.url {
        Some(url) => url,
        None => return Ok(()),
    };
    w.write_str(r#"<p class="block-img"><img src=""#)?;
    escape_href(&mut *w, url)?;
    w.write_str(r#"" alt=""#)?;
    escape_html(&mut *w, block.alt.as_deref().unwrap_or_default())?;
    w.write_str(r#""></p>"#)
}

fn push_embed<W: StrWrite>(w: &mut W, block: &Block) -> io::Result<()> {
    let embed = match &block.oembed {
        Some(embed) => embed,
        None => return Ok(()),
    };
    w.write_str(r#"<div data-oembed=""#)?;
    escape_href(&mut *w, &embed.embed_url)?;
    w.write_str(r#"" data-oembed-type=""#)?;
    escape_html(&mut *w, &embed.kind)?;
    w.write_str(r#"">"#)?;
    // provider markup is trusted as-is
    w.write_str(embed.html.as_deref().unwrap_or_default())?;
    w.write_str("</div>")
}

/// Writes `text` with `spans` applied as nested inline elements. Spans which
/// overlap without nesting are closed and reopened around each other so the
/// output is always well-formed. Offsets count `char`s.
fn push_spans<W: StrWrite>(
    w: &mut W,
    text: &str,
    spans: &[Span],
) -> io::Result<()> {
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = offsets.len() - 1;

    let mut spans: Vec<&Span> = spans
        .iter()
        .filter(|s| s.start < s.end && s.end <= len && is_known(s))
        .collect();
    // outer spans first
    spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut bounds: Vec<usize> = spans
        .iter()
        .flat_map(|s| [s.start, s.end])
        .chain([0, len])
        .collect();
    bounds.sort_unstable();
    bounds.dedup();

    let mut open: Vec<&Span> = Vec::new();
    let mut next = 0;
    for (i, &at) in bounds.iter().enumerate() {
        if open.iter().any(|s| s.end == at) {
            let mut reopen = Vec::new();
            while let Some(span) = open.pop() {
                close_span(w, span)?;
                if span.end != at {
                    reopen.push(span);
                }
                if !open.iter().any(|s| s.end == at) {
                    break;
                }
            }
            for span in reopen.into_iter().rev() {
                open_span(w, span)?;
                open.push(span);
            }
        }
        while next < spans.len() && spans[next].start == at {
            open_span(w, spans[next])?;
            open.push(spans[next]);
            next += 1;
        }
        if let Some(&until) = bounds.get(i + 1) {
            escape_html(&mut *w, &text[offsets[at]..offsets[until]])?;
        }
    }
    Ok(())
}

fn is_known(span: &Span) -> bool {
    matches!(span.kind.as_str(), "strong" | "em" | "hyperlink" | "label")
}

fn open_span<W: StrWrite>(w: &mut W, span: &Span) -> io::Result<()> {
    let data = span.data.clone().unwrap_or_default();
    match span.kind.as_str() {
        "strong" => w.write_str("<strong>"),
        "em" => w.write_str("<em>"),
        "hyperlink" => {
            w.write_str(r#"<a href=""#)?;
            escape_href(&mut *w, data.url.as_deref().unwrap_or_default())?;
            if let Some(target) = &data.target {
                w.write_str(r#"" target=""#)?;
                escape_html(&mut *w, target)?;
                w.write_str(r#"" rel="noopener"#)?;
            }
            w.write_str(r#"">"#)
        }
        _ => {
            w.write_str(r#"<span class=""#)?;
            escape_html(&mut *w, data.label.as_deref().unwrap_or_default())?;
            w.write_str(r#"">"#)
        }
    }
}

fn close_span<W: StrWrite>(w: &mut W, span: &Span) -> io::Result<()> {
    w.write_str(match span.kind.as_str() {
        "strong" => "</strong>",
        "em" => "</em>",
        "hyperlink" => "</a>",
        _ => "</span>",
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn doc(value: Json) -> RichText {
        RichText::from_json(value)
    }

    #[test]
    fn test_as_text_joins_blocks_with_spaces() {
        let body = doc(json!([
            {"type": "paragraph", "text": "Lorem ipsum", "spans": []},
            {"type": "image", "url": "https://example.org/a.png"},
            {"type": "list-item", "text": "dolor", "spans": []},
        ]));
        assert_eq!("Lorem ipsum dolor", body.as_text());
    }

    #[test]
    fn test_malformed_span_keeps_block_text() {
        let body = doc(json!([
            {"type": "paragraph", "text": "four five six", "spans": [
                {"start": 0, "type": "strong"},
                {"start": 5, "end": 9, "type": "em"},
            ]},
            {"type": "paragraph", "text": "seven", "spans": "bogus"},
        ]));
        assert_eq!("four five six seven", body.as_text());
        assert_eq!(1, body.0[0].spans.len());
        assert_eq!("<p>four <em>five</em> six</p><p>seven</p>", body.as_html());
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(
            "Tom &amp; &lt;script&gt;alert(1)&lt;/script&gt; &quot;x&quot;",
            escape_text("Tom & <script>alert(1)</script> \"x\"")
        );
    }

    #[test]
    fn test_malformed_body_degrades_to_empty() {
        assert_eq!(RichText::default(), doc(json!({"type": "paragraph"})));
        assert_eq!(RichText::default(), doc(json!(null)));
        assert_eq!("", doc(json!("just a string")).as_text());
    }

    #[test]
    fn test_unrecognized_elements_are_skipped() {
        let body = doc(json!([42, {"text": "no type"}, {"type": "paragraph", "text": "kept"}]));
        assert_eq!(1, body.0.len());
        assert_eq!("kept", body.as_text());
    }

    #[test]
    fn test_deserialize_inside_struct() -> serde_json::Result<()> {
        #[derive(Deserialize)]
        struct Section {
            body: RichText,
        }
        let section: Section = serde_json::from_str(r#"{"body": {"oops": true}}"#)?;
        assert_eq!(RichText::default(), section.body);
        Ok(())
    }

    #[test]
    fn test_as_html_applies_spans() {
        let body = doc(json!([{
            "type": "paragraph",
            "text": "Hello world",
            "spans": [{"start": 0, "end": 5, "type": "strong"}]
        }]));
        assert_eq!("<p><strong>Hello</strong> world</p>", body.as_html());
    }

    #[test]
    fn test_as_html_reopens_overlapping_spans() {
        let body = doc(json!([{
            "type": "paragraph",
            "text": "abcdef",
            "spans": [
                {"start": 2, "end": 6, "type": "em"},
                {"start": 0, "end": 4, "type": "strong"}
            ]
        }]));
        assert_eq!(
            "<p><strong>ab<em>cd</em></strong><em>ef</em></p>",
            body.as_html()
        );
    }

    #[test]
    fn test_as_html_hyperlink_and_label() {
        let body = doc(json!([{
            "type": "heading2",
            "text": "see docs",
            "spans": [
                {"start": 4, "end": 8, "type": "hyperlink", "data": {"url": "https://example.org/"}},
                {"start": 0, "end": 3, "type": "label", "data": {"label": "note"}}
            ]
        }]));
        assert_eq!(
            r#"<h2><span class="note">see</span> <a href="https://example.org/">docs</a></h2>"#,
            body.as_html()
        );
    }

    #[test]
    fn test_as_html_groups_list_items() {
        let body = doc(json!([
            {"type": "list-item", "text": "a", "spans": []},
            {"type": "list-item", "text": "b", "spans": []},
            {"type": "paragraph", "text": "c", "spans": []},
            {"type": "o-list-item", "text": "d", "spans": []}
        ]));
        assert_eq!(
            "<ul><li>a</li><li>b</li></ul><p>c</p><ol><li>d</li></ol>",
            body.as_html()
        );
    }

    #[test]
    fn test_as_html_escapes_text() {
        let body = doc(json!([{"type": "preformatted", "text": "a < b & c", "spans": []}]));
        assert_eq!("<pre>a &lt; b &amp; c</pre>", body.as_html());
    }

    #[test]
    fn test_as_html_ignores_out_of_range_spans() {
        let body = doc(json!([{
            "type": "paragraph",
            "text": "héllo",
            "spans": [
                {"start": 0, "end": 2, "type": "em"},
                {"start": 3, "end": 99, "type": "strong"},
                {"start": 1, "end": 1, "type": "strong"}
            ]
        }]));
        assert_eq!("<p><em>hé</em>llo</p>", body.as_html());
    }

    #[test]
    fn test_as_html_image() {
        let body = doc(json!([{"type": "image", "url": "https://example.org/a.png", "alt": "a planet"}]));
        assert_eq!(
            r#"<p class="block-img"><img src="https://example.org/a.png" alt="a planet"></p>"#,
            body.as_html()
        );
    }
}
