//! Lenient markup parsing.
//!
//! Content documents in the wild are frequently not well-formed XHTML.
//! Documents that declare the XHTML namespace are tried with xml5ever first,
//! so XML-only syntax such as `<title/>` keeps its meaning; anything it
//! reports an error for, and every other document, goes through html5ever's
//! error-recovering tree builder.

mod arena;
mod serialize;
mod tree_sink;

pub use arena::{Attribute, Dom, Node, NodeData, NodeId};
pub use serialize::outer_html;

use html5ever::driver::ParseOpts;
use html5ever::tendril::TendrilSink;
use tracing::debug;
use xml5ever::driver::XmlParseOpts;

use tree_sink::DomSink;

const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Parse a content or navigation document.
///
/// Well-formed XHTML is parsed as XML; everything else, including XHTML with
/// any XML error, is parsed as HTML.
pub fn parse_markup(markup: &str) -> Dom {
    if markup.contains(XHTML_NAMESPACE) {
        let (dom, errors) = parse_xml(markup);
        if errors == 0 {
            return dom;
        }
        debug!(errors, "Document is not well-formed XML, parsing as HTML");
    }

    let (dom, errors) = parse_html_with_errors(markup);
    if errors > 0 {
        debug!(errors, "Recovered from markup errors");
    }
    dom
}

/// Parse a document with HTML rules, recovering from any syntax error.
pub fn parse_html(html: &str) -> Dom {
    parse_html_with_errors(html).0
}

fn parse_html_with_errors(html: &str) -> (Dom, usize) {
    html5ever::parse_document(DomSink::new(), ParseOpts::default())
        .one(html)
        .into_parts()
}

fn parse_xml(xml: &str) -> (Dom, usize) {
    xml5ever::driver::parse_document(DomSink::new(), XmlParseOpts::default())
        .one(xml)
        .into_parts()
}
