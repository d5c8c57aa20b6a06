//! Content negotiation between HTML and `ActivityPub` representations.
//!
//! The decision is a pure function of the `Accept` header, recomputed for
//! every request.

use axum::http::{HeaderMap, header};

/// `ActivityStreams` media type preferred by most implementations.
pub const ACTIVITY_JSON: &str = "application/activity+json";

/// JSON-LD media type with the `ActivityStreams` profile.
pub const LD_JSON: &str = "application/ld+json; profile=\"https://www.w3.org/ns/activitystreams\"";

/// The representation chosen for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    Html,
    ActivityJson,
    LdJson,
}

impl Representation {
    /// Candidates in server preference order.
    const CANDIDATES: [Self; 3] = [Self::Html, Self::ActivityJson, Self::LdJson];

    const fn media_type(self) -> (&'static str, &'static str) {
        match self {
            Self::Html => ("text", "html"),
            Self::ActivityJson => ("application", "activity+json"),
            Self::LdJson => ("application", "ld+json"),
        }
    }

    /// `Content-Type` header value for this representation.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Html => "text/html; charset=utf-8",
            Self::ActivityJson => "application/activity+json; charset=utf-8",
            Self::LdJson => {
                "application/ld+json; profile=\"https://www.w3.org/ns/activitystreams\"; charset=utf-8"
            }
        }
    }

    #[must_use]
    pub const fn is_activity_pub(self) -> bool {
        !matches!(self, Self::Html)
    }
}

/// One media range of an `Accept` header.
#[derive(Debug)]
struct MediaRange<'a> {
    kind: &'a str,
    subtype: &'a str,
    /// Quality in thousandths.
    quality: u16,
}

impl<'a> MediaRange<'a> {
    fn parse(entry: &'a str) -> Option<Self> {
        let mut parts = entry.split(';');
        let (kind, subtype) = parts.next()?.trim().split_once('/')?;
        let mut quality = 1000;
        for param in parts {
            let Some((name, value)) = param.split_once('=') else {
                continue;
            };
            if name.trim().eq_ignore_ascii_case("q") {
                quality = parse_quality(value.trim())?;
            }
        }
        Some(Self {
            kind: kind.trim(),
            subtype: subtype.trim(),
            quality,
        })
    }

    /// 2 for an exact match, 1 for `type/*`, 0 for `*/*`.
    fn specificity(&self, (kind, subtype): (&str, &str)) -> Option<u8> {
        if self.kind == "*" && self.subtype == "*" {
            return Some(0);
        }
        if !self.kind.eq_ignore_ascii_case(kind) {
            return None;
        }
        if self.subtype == "*" {
            Some(1)
        } else if self.subtype.eq_ignore_ascii_case(subtype) {
            Some(2)
        } else {
            None
        }
    }
}

fn parse_quality(value: &str) -> Option<u16> {
    let q: f32 = value.parse().ok()?;
    if !(0.0..=1.0).contains(&q) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some((q * 1000.0).round() as u16)
}

#[derive(Debug, Clone, Copy)]
struct Score {
    representation: Representation,
    quality: u16,
    specificity: u8,
    position: usize,
}

impl Score {
    fn beats(&self, other: &Self) -> bool {
        if self.quality != other.quality {
            return self.quality > other.quality;
        }
        if self.specificity != other.specificity {
            return self.specificity > other.specificity;
        }
        // Equal standing between the two ActivityPub types goes to activity+json.
        if self.representation.is_activity_pub() && other.representation.is_activity_pub() {
            return self.representation == Representation::ActivityJson
                && other.representation == Representation::LdJson;
        }
        self.position < other.position
    }
}

/// Choose a representation for the given `Accept` header value.
///
/// A missing header or one nothing acceptable matches yields HTML.
#[must_use]
pub fn negotiate(accept: Option<&str>) -> Representation {
    let Some(accept) = accept.filter(|a| !a.trim().is_empty()) else {
        return Representation::Html;
    };
    let ranges: Vec<MediaRange<'_>> = accept.split(',').filter_map(MediaRange::parse).collect();

    let mut best: Option<Score> = None;
    for representation in Representation::CANDIDATES {
        let media_type = representation.media_type();
        let matched = ranges
            .iter()
            .enumerate()
            .filter_map(|(position, range)| {
                range.specificity(media_type).map(|specificity| Score {
                    representation,
                    quality: range.quality,
                    specificity,
                    position,
                })
            })
            .max_by_key(|s| s.specificity);

        let Some(score) = matched.filter(|s| s.quality > 0) else {
            continue;
        };
        if best.as_ref().is_none_or(|b| score.beats(b)) {
            best = Some(score);
        }
    }

    best.map_or(Representation::Html, |s| s.representation)
}

/// Negotiate from request headers.
#[must_use]
pub fn negotiate_headers(headers: &HeaderMap) -> Representation {
    negotiate(headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()))
}

/// Whether the requester wants an `ActivityPub` document.
#[must_use]
pub fn wants_activity_pub(headers: &HeaderMap) -> bool {
    negotiate_headers(headers).is_activity_pub()
}
