//! Entity substitution for the five markup-special characters.
//!
//! Contract:
//! - `&` → `&amp;`, `<` → `&lt;`, `>` → `&gt;`, `"` → `&quot;`, `'` → `&#39;`.
//! - Every other byte is copied unchanged, so UTF-8 sequences in text input
//!   survive intact (all five specials are ASCII and never appear inside a
//!   multi-byte sequence).
//! - Input without specials is returned borrowed; no allocation happens on
//!   that path.

use std::borrow::Cow;
use std::ops::Range;

use memchr::{memchr2, memchr3};

pub fn escape_text(s: &str) -> Cow<'_, str> {
    match find_special(s.as_bytes(), 0) {
        None => Cow::Borrowed(s),
        Some(first) => Cow::Owned(escape_text_from(s, first)),
    }
}

pub fn escape_bytes(b: &[u8]) -> Cow<'_, [u8]> {
    match find_special(b, 0) {
        None => Cow::Borrowed(b),
        Some(first) => Cow::Owned(escape_bytes_from(b, first)),
    }
}

/// Owned variant of [`escape_text`]; hands the input back untouched when
/// nothing needs escaping.
pub fn escape_text_owned(s: String) -> String {
    match find_special(s.as_bytes(), 0) {
        None => s,
        Some(first) => escape_text_from(&s, first),
    }
}

pub fn escape_bytes_owned(b: Vec<u8>) -> Vec<u8> {
    match find_special(&b, 0) {
        None => b,
        Some(first) => escape_bytes_from(&b, first),
    }
}

pub fn needs_escape(b: &[u8]) -> bool {
    find_special(b, 0).is_some()
}

/// Exact output length of escaping `b`.
pub fn escaped_len(b: &[u8]) -> usize {
    let mut len = b.len();
    for_each_segment(b, 0, |seg| {
        if let Segment::Entity(e) = seg {
            len += e.len() - 1;
        }
    });
    len
}

pub(crate) fn entity(b: u8) -> Option<&'static str> {
    match b {
        b'&' => Some("&amp;"),
        b'<' => Some("&lt;"),
        b'>' => Some("&gt;"),
        b'"' => Some("&quot;"),
        b'\'' => Some("&#39;"),
        _ => None,
    }
}

fn escape_text_from(s: &str, first: usize) -> String {
    let mut out = String::with_capacity(grown_capacity(s.len()));
    for_each_segment(s.as_bytes(), first, |seg| match seg {
        // Runs start and end at ASCII positions, so they are char boundaries.
        Segment::Run(range) => out.push_str(&s[range]),
        Segment::Entity(e) => out.push_str(e),
    });
    log::trace!(target: "markup.escape", "escaped text {} -> {} bytes", s.len(), out.len());
    out
}

fn escape_bytes_from(b: &[u8], first: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(grown_capacity(b.len()));
    for_each_segment(b, first, |seg| match seg {
        Segment::Run(range) => out.extend_from_slice(&b[range]),
        Segment::Entity(e) => out.extend_from_slice(e.as_bytes()),
    });
    log::trace!(target: "markup.escape", "escaped bytes {} -> {} bytes", b.len(), out.len());
    out
}

fn grown_capacity(len: usize) -> usize {
    len.saturating_add(len / 8).saturating_add(16)
}

enum Segment {
    Run(Range<usize>),
    Entity(&'static str),
}

/// Walk `bytes` as alternating unchanged runs and entities. `first` must be
/// at or before the first special byte.
fn for_each_segment(bytes: &[u8], first: usize, mut emit: impl FnMut(Segment)) {
    let mut finder = SpecialFinder::new(bytes);
    let mut copy_start = 0;
    let mut pos = first;
    while let Some(at) = finder.next_from(pos) {
        if copy_start < at {
            emit(Segment::Run(copy_start..at));
        }
        if let Some(e) = entity(bytes[at]) {
            emit(Segment::Entity(e));
        }
        pos = at + 1;
        copy_start = pos;
    }
    if copy_start < bytes.len() {
        emit(Segment::Run(copy_start..bytes.len()));
    }
}

fn find_special(bytes: &[u8], from: usize) -> Option<usize> {
    SpecialFinder::new(bytes).next_from(from)
}

/// Two memchr scanners (`& < >` and `" '`) with cached hits, so a long run
/// without quotes is scanned once rather than once per ampersand.
struct SpecialFinder<'a> {
    bytes: &'a [u8],
    markup: Cached,
    quotes: Cached,
}

#[derive(Clone, Copy)]
enum Cached {
    Unknown,
    At(usize),
    Exhausted,
}

impl<'a> SpecialFinder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            markup: Cached::Unknown,
            quotes: Cached::Unknown,
        }
    }

    fn next_from(&mut self, from: usize) -> Option<usize> {
        let bytes = self.bytes;
        let markup = refresh(&mut self.markup, from, |at| {
            memchr3(b'&', b'<', b'>', &bytes[at..]).map(|rel| at + rel)
        });
        let quotes = refresh(&mut self.quotes, from, |at| {
            memchr2(b'"', b'\'', &bytes[at..]).map(|rel| at + rel)
        });
        match (markup, quotes) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

fn refresh(cached: &mut Cached, from: usize, scan: impl FnOnce(usize) -> Option<usize>) -> Option<usize> {
    match *cached {
        Cached::At(at) if at >= from => return Some(at),
        Cached::Exhausted => return None,
        _ => {}
    }
    let found = scan(from);
    *cached = found.map_or(Cached::Exhausted, Cached::At);
    found
}
