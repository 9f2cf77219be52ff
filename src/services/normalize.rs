// Provider payload → CanonicalMovie. One function per provider shape; all of
// them share the title, year, runtime and "N/A" rules below.

use regex::Regex;
use std::sync::LazyLock;

use super::imdb::ImdbSuggestion;
use super::omdb::OmdbMovie;
use super::source::RawRecord;
use super::tmdb::{TmdbMovie, TMDB_IMAGE_BASE};
use super::url_cleanup::TMDB_POSTER_SIZE;
use crate::error::NormalizeError;
use crate::models::CanonicalMovie;

static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})\b").unwrap());
static RE_INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Titles providers use when they have nothing; compared case-insensitively
const PLACEHOLDER_TITLES: &[&str] = &[
    "unknown title",
    "unknown",
    "untitled",
    "n/a",
    "null",
    "undefined",
];

pub fn normalize(record: RawRecord, source: &str) -> Result<CanonicalMovie, NormalizeError> {
    match record {
        RawRecord::Tmdb(movie) => from_tmdb(movie, source),
        RawRecord::Omdb(movie) => from_omdb(movie, source),
        RawRecord::Imdb(suggestion) => from_imdb(suggestion, source),
    }
}

/// Normalize a batch, logging and skipping dropped records
pub fn normalize_all(records: Vec<RawRecord>, source: &str) -> Vec<CanonicalMovie> {
    records
        .into_iter()
        .filter_map(|record| match normalize(record, source) {
            Ok(movie) => Some(movie),
            Err(e) => {
                tracing::debug!("{}: dropping record: {}", source, e);
                None
            }
        })
        .collect()
}

pub fn clean_title(raw: Option<&str>) -> Result<String, NormalizeError> {
    let title = raw.map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(NormalizeError::EmptyTitle);
    }
    let lower = title.to_lowercase();
    if PLACEHOLDER_TITLES.contains(&lower.as_str()) {
        return Err(NormalizeError::PlaceholderTitle(title.to_string()));
    }
    Ok(title.to_string())
}

/// Trimmed text, absent when blank or "N/A"
pub fn clean_text(raw: Option<String>) -> Option<String> {
    let text = raw?;
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("n/a") {
        None
    } else {
        Some(text.to_string())
    }
}

/// First 4-digit token: "2008-07-16" → 2008, "2010–2014" → 2010
pub fn parse_year(text: &str) -> Option<i32> {
    RE_YEAR
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// First integer token: "169 min" → 169
pub fn parse_runtime(text: &str) -> Option<u32> {
    RE_INTEGER
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

fn parse_rating(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|r| r.is_finite() && *r >= 0.0)
}

fn from_tmdb(movie: TmdbMovie, source: &str) -> Result<CanonicalMovie, NormalizeError> {
    if movie.id <= 0 {
        return Err(NormalizeError::MissingId);
    }
    let title = clean_title(movie.title.as_deref().or(movie.original_title.as_deref()))?;

    // TMDB reports 0.0 for titles nobody has voted on
    let rating = match (movie.vote_average, movie.vote_count) {
        (Some(avg), Some(0)) if avg == 0.0 => None,
        (Some(avg), _) if avg.is_finite() && avg >= 0.0 => Some(avg),
        _ => None,
    };

    let poster_url = clean_text(movie.poster_path).map(|path| {
        if path.starts_with("http") {
            path
        } else {
            format!("{}/{}{}", TMDB_IMAGE_BASE, TMDB_POSTER_SIZE, path)
        }
    });

    Ok(CanonicalMovie {
        id: format!("tmdb:{}", movie.id),
        title,
        year: movie.release_date.as_deref().and_then(parse_year),
        plot: clean_text(movie.overview),
        poster_url,
        rating,
        source: source.to_string(),
        runtime_minutes: movie.runtime.and_then(|r| u32::try_from(r).ok()).filter(|r| *r > 0),
    })
}

fn from_omdb(movie: OmdbMovie, source: &str) -> Result<CanonicalMovie, NormalizeError> {
    let imdb_id = clean_text(movie.imdb_id).ok_or(NormalizeError::MissingId)?;
    let title = clean_title(movie.title.as_deref())?;

    Ok(CanonicalMovie {
        id: format!("imdb:{}", imdb_id),
        title,
        year: clean_text(movie.year).as_deref().and_then(parse_year),
        plot: clean_text(movie.plot),
        poster_url: clean_text(movie.poster),
        rating: clean_text(movie.imdb_rating).as_deref().and_then(parse_rating),
        source: source.to_string(),
        runtime_minutes: clean_text(movie.runtime).as_deref().and_then(parse_runtime),
    })
}

fn from_imdb(suggestion: ImdbSuggestion, source: &str) -> Result<CanonicalMovie, NormalizeError> {
    let id = suggestion.id.trim();
    if id.is_empty() {
        return Err(NormalizeError::MissingId);
    }
    let title = clean_title(suggestion.title.as_deref())?;

    Ok(CanonicalMovie {
        id: format!("imdb:{}", id),
        title,
        year: suggestion.year.filter(|y| *y > 0),
        plot: None,
        poster_url: suggestion.image.and_then(|image| clean_text(Some(image.url))),
        rating: None,
        source: source.to_string(),
        runtime_minutes: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::imdb::ImdbImage;

    #[test]
    fn test_titles() {
        assert_eq!(clean_title(Some("  Heat ")), Ok("Heat".to_string()));
        assert_eq!(clean_title(Some("   ")), Err(NormalizeError::EmptyTitle));
        assert_eq!(clean_title(None), Err(NormalizeError::EmptyTitle));
        for placeholder in ["Unknown Title", "UNKNOWN", "untitled", "N/A", "null", "Undefined"] {
            assert!(matches!(
                clean_title(Some(placeholder)),
                Err(NormalizeError::PlaceholderTitle(_))
            ));
        }
        // Only exact placeholders are dropped
        assert!(clean_title(Some("The Unknown Known")).is_ok());
    }

    #[test]
    fn test_year_and_runtime_parsing() {
        assert_eq!(parse_year("2008-07-16"), Some(2008));
        assert_eq!(parse_year("2010–2014"), Some(2010));
        assert_eq!(parse_year("N/A"), None);
        assert_eq!(parse_year("12345"), None);
        assert_eq!(parse_runtime("169 min"), Some(169));
        assert_eq!(parse_runtime("approx. 95 minutes"), Some(95));
        assert_eq!(parse_runtime("N/A"), None);
        assert_eq!(parse_runtime("0 min"), Some(0));
    }

    #[test]
    fn test_tmdb_record() {
        let movie = TmdbMovie {
            id: 155,
            title: Some(" The Dark Knight ".to_string()),
            overview: Some("Batman raises the stakes.".to_string()),
            release_date: Some("2008-07-16".to_string()),
            poster_path: Some("/qJ2tW6WMUDux911r6m7haRef0WH.jpg".to_string()),
            vote_average: Some(8.5),
            vote_count: Some(32000),
            runtime: Some(152),
            ..Default::default()
        };
        let canonical = normalize(RawRecord::Tmdb(movie), "tmdb").unwrap();

        assert_eq!(canonical.id, "tmdb:155");
        assert_eq!(canonical.title, "The Dark Knight");
        assert_eq!(canonical.year, Some(2008));
        assert_eq!(
            canonical.poster_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/qJ2tW6WMUDux911r6m7haRef0WH.jpg")
        );
        assert_eq!(canonical.rating, Some(8.5));
        assert_eq!(canonical.runtime_minutes, Some(152));
        assert_eq!(canonical.source, "tmdb");
    }

    #[test]
    fn test_tmdb_unrated_and_empty_fields() {
        let movie = TmdbMovie {
            id: 7,
            title: Some("Obscure".to_string()),
            overview: Some("".to_string()),
            release_date: Some("".to_string()),
            vote_average: Some(0.0),
            vote_count: Some(0),
            ..Default::default()
        };
        let canonical = normalize(RawRecord::Tmdb(movie), "tmdb").unwrap();
        assert_eq!(canonical.rating, None);
        assert_eq!(canonical.plot, None);
        assert_eq!(canonical.year, None);
        assert_eq!(canonical.poster_url, None);
    }

    #[test]
    fn test_omdb_na_fields_are_absent() {
        let movie = OmdbMovie {
            title: Some("Interstellar".to_string()),
            year: Some("2014".to_string()),
            imdb_id: Some("tt0816692".to_string()),
            poster: Some("N/A".to_string()),
            plot: Some("N/A".to_string()),
            runtime: Some("169 min".to_string()),
            imdb_rating: Some("N/A".to_string()),
            ..Default::default()
        };
        let canonical = normalize(RawRecord::Omdb(movie), "omdb").unwrap();

        assert_eq!(canonical.id, "imdb:tt0816692");
        assert_eq!(canonical.year, Some(2014));
        assert_eq!(canonical.runtime_minutes, Some(169));
        assert_eq!(canonical.poster_url, None);
        assert_eq!(canonical.plot, None);
        assert_eq!(canonical.rating, None);
    }

    #[test]
    fn test_omdb_without_id_is_dropped() {
        let movie = OmdbMovie {
            title: Some("Interstellar".to_string()),
            imdb_id: Some("N/A".to_string()),
            ..Default::default()
        };
        assert_eq!(
            normalize(RawRecord::Omdb(movie), "omdb"),
            Err(NormalizeError::MissingId)
        );
    }

    #[test]
    fn test_imdb_suggestion() {
        let suggestion = ImdbSuggestion {
            id: "tt0133093".to_string(),
            title: Some("The Matrix".to_string()),
            year: Some(1999),
            image: Some(ImdbImage {
                url: "https://m.media-amazon.com/images/M/a.jpg".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let canonical = normalize(RawRecord::Imdb(suggestion), "imdb").unwrap();
        assert_eq!(canonical.id, "imdb:tt0133093");
        assert_eq!(canonical.year, Some(1999));
        assert!(canonical.poster_url.is_some());
        assert_eq!(canonical.rating, None);
    }

    #[test]
    fn test_normalize_all_skips_placeholders() {
        let records = vec![
            RawRecord::Tmdb(TmdbMovie {
                id: 1,
                title: Some("Unknown Title".to_string()),
                ..Default::default()
            }),
            RawRecord::Tmdb(TmdbMovie {
                id: 2,
                title: Some("Alien".to_string()),
                ..Default::default()
            }),
        ];
        let movies = normalize_all(records, "tmdb");
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].id, "tmdb:2");
    }
}
