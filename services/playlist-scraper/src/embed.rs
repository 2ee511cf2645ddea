//!
//! src/embed.rs
//!
//! Pulls a spotify track id out of an embed snippet, e.g. the iframe
//! spotify hands out under "Share > Embed track"
//!

use scraper::{Html, Selector};

use crate::errors::ScraperError;
use crate::types::SpotifyTrackId;

const EMBED_MARKER: &str = "spotify.com/embed/track/";

/// Maximal run of ascii alphanumerics following the embed marker
fn id_after_marker(text: &str) -> Option<&str> {
    text.match_indices(EMBED_MARKER).find_map(|(at, marker)| {
        let rest = &text[at + marker.len()..];
        let end = rest.find(|c: char| !c.is_ascii_alphanumeric()).unwrap_or(rest.len());
        (end > 0).then(|| &rest[..end])
    })
}

fn id_from_attributes(html: &Html) -> Result<Option<String>, ScraperError> {
    for (css, attr) in [("iframe[src]", "src"), ("a[href]", "href")] {
        let selector = Selector::parse(css)
            .map_err(|e| ScraperError::Parse(format!("selector {css}: {e:?}")))?;

        let found = html.select(&selector)
            .filter_map(|element| element.value().attr(attr))
            .find_map(id_after_marker);
        if let Some(id) = found {
            return Ok(Some(id.to_string()));
        }
    }
    Ok(None)
}

/// The raw text is scanned first so the earliest reference wins. Parsed
/// attributes only catch references hidden behind entities (`&#x2F;`)
pub fn extract_track_id(text: &str) -> Result<SpotifyTrackId, ScraperError> {
    if let Some(id) = id_after_marker(text) {
        return Ok(SpotifyTrackId(id.to_string()));
    }
    id_from_attributes(&Html::parse_fragment(text))?
        .map(SpotifyTrackId)
        .ok_or_else(|| ScraperError::NotFound("spotify track id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const IFRAME: &str = r#"
<iframe data-testid="embed-iframe" style="border-radius:12px" src="https://open.spotify.com/embed/track/4gT1faTjrtFRFTsr2bqqYV?utm_source=generator" width="100%" height="352" frameBorder="0" allowfullscreen="" allow="autoplay; clipboard-write; encrypted-media; fullscreen; picture-in-picture" loading="lazy"></iframe>
"#;

    #[test]
    fn iframe_snippet() {
        let id = extract_track_id(IFRAME).unwrap();
        assert_eq!(id.as_str(), "4gT1faTjrtFRFTsr2bqqYV");
    }

    #[test]
    fn anchor_and_plain_text() {
        let anchor = r#"<p>listen <a href="https://open.spotify.com/embed/track/6GtOsEzNUhJghrIf6UTbRV">here</a></p>"#;
        assert_eq!(extract_track_id(anchor).unwrap().as_str(), "6GtOsEzNUhJghrIf6UTbRV");

        let plain = "copied: open.spotify.com/embed/track/abc123XYZ, thanks";
        assert_eq!(extract_track_id(plain).unwrap().as_str(), "abc123XYZ");
    }

    #[test]
    fn first_non_empty_reference_wins() {
        let text = "spotify.com/embed/track/?x=1 then spotify.com/embed/track/Second1";
        assert_eq!(extract_track_id(text).unwrap().as_str(), "Second1");
    }

    #[test]
    fn earlier_text_reference_beats_later_iframe() {
        let text = format!("see spotify.com/embed/track/TextFirst1 or {IFRAME}");
        assert_eq!(extract_track_id(&text).unwrap().as_str(), "TextFirst1");
    }

    #[test]
    fn entity_encoded_src_is_decoded() {
        let encoded = r#"<iframe src="https:&#x2F;&#x2F;open.spotify.com&#x2F;embed&#x2F;track&#x2F;Encoded42?a=b"></iframe>"#;
        assert_eq!(extract_track_id(encoded).unwrap().as_str(), "Encoded42");
    }

    #[test]
    fn missing_reference_is_not_found() {
        for text in [
            "",
            "<iframe src=\"https://open.spotify.com/embed/album/1DFixLWuPkv3KT3TnV35m3\"></iframe>",
            "https://open.spotify.com/track/4gT1faTjrtFRFTsr2bqqYV",
            "spotify.com/embed/track/",
        ] {
            let err = extract_track_id(text).unwrap_err();
            assert!(matches!(err, ScraperError::NotFound(_)), "{text}: {err:?}");
        }
    }
}
