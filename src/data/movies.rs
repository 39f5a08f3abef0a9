//! The movie resource: model, validation rules, and in-memory store.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::data::error::StoreError;
use crate::validator::{self, Validator};

/// Running time in minutes. Encoded as `"<n> mins"`, decoded from a bare integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Runtime(pub i32);

impl Runtime {
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{} mins", self.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Movie {
    pub id: i64,

    #[serde(skip)]
    pub created_at: DateTime<Utc>,

    pub title: String,

    #[serde(skip_serializing_if = "is_zero")]
    pub year: i32,

    #[serde(skip_serializing_if = "Runtime::is_zero")]
    pub runtime: Runtime,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,

    pub version: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

/// Client-supplied movie fields. Absent fields are `None`; for updates
/// only the present ones are applied.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MovieInput {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<Runtime>,
    pub genres: Option<Vec<String>>,
}

impl MovieInput {
    /// Build an unsaved movie; missing fields stay empty and fail validation.
    pub fn into_movie(self) -> Movie {
        let mut movie = Movie {
            id: 0,
            created_at: Utc::now(),
            title: String::new(),
            year: 0,
            runtime: Runtime::default(),
            genres: Vec::new(),
            version: 0,
        };
        self.apply_to(&mut movie);
        movie
    }

    pub fn apply_to(self, movie: &mut Movie) {
        if let Some(title) = self.title {
            movie.title = title;
        }
        if let Some(year) = self.year {
            movie.year = year;
        }
        if let Some(runtime) = self.runtime {
            movie.runtime = runtime;
        }
        if let Some(genres) = self.genres {
            movie.genres = genres;
        }
    }
}

pub fn validate_movie(v: &mut Validator, movie: &Movie) {
    v.check(!movie.title.is_empty(), "title", "must be provided");
    v.check(movie.title.len() <= 500, "title", "must not be more than 500 bytes long");

    v.check(movie.year != 0, "year", "must be provided");
    v.check(movie.year >= 1888, "year", "must be greater than 1888");
    v.check(movie.year <= current_year(), "year", "must not be in the future");

    v.check(movie.runtime.0 != 0, "runtime", "must be provided");
    v.check(movie.runtime.0 > 0, "runtime", "must be a positive integer");

    v.check(!movie.genres.is_empty(), "genres", "must contain at least 1 genre");
    v.check(movie.genres.len() <= 5, "genres", "must not contain more than 5 genres");
    v.check(validator::unique(&movie.genres), "genres", "must not contain duplicate values");
}

fn current_year() -> i32 {
    Utc::now().year()
}

/// Create-time checks on the raw input. An absent `genres` key is
/// reported differently from an empty list.
pub fn validate_movie_input(v: &mut Validator, input: &MovieInput) {
    v.check(input.genres.is_some(), "genres", "must be provided");
}

struct MovieTable {
    rows: BTreeMap<i64, Movie>,
    next_id: i64,
}

/// In-memory movie table with optimistic versioning.
pub struct MovieStore {
    table: Mutex<MovieTable>,
}

impl Default for MovieStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MovieStore {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(MovieTable {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Assign an id and initial version, then store the movie.
    pub fn insert(&self, mut movie: Movie) -> Result<Movie, StoreError> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        movie.id = table.next_id;
        movie.version = 1;
        movie.created_at = Utc::now();
        table.next_id += 1;
        table.rows.insert(movie.id, movie.clone());
        Ok(movie)
    }

    pub fn get(&self, id: i64) -> Result<Option<Movie>, StoreError> {
        let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(table.rows.get(&id).cloned())
    }

    pub fn list(&self) -> Result<Vec<Movie>, StoreError> {
        let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(table.rows.values().cloned().collect())
    }

    /// Replace the stored row if its version still matches `movie.version`.
    /// The returned movie carries the bumped version.
    pub fn update(&self, mut movie: Movie) -> Result<Movie, StoreError> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let row = table.rows.get_mut(&movie.id).ok_or(StoreError::EditConflict)?;
        if row.version != movie.version {
            return Err(StoreError::EditConflict);
        }
        movie.version += 1;
        *row = movie.clone();
        Ok(movie)
    }

    /// Returns false when no such movie existed.
    pub fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(table.rows.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn casablanca() -> Movie {
        MovieInput {
            title: Some("Casablanca".into()),
            year: Some(1942),
            runtime: Some(Runtime(102)),
            genres: Some(vec!["drama".into(), "romance".into()]),
        }
        .into_movie()
    }

    #[test]
    fn runtime_encodes_as_minutes_and_zero_fields_are_omitted() {
        let mut movie = casablanca();
        movie.id = 3;
        movie.version = 1;
        let json = serde_json::to_value(&movie).unwrap();
        assert_eq!(json["runtime"], "102 mins");
        assert!(json.get("created_at").is_none());

        movie.year = 0;
        movie.runtime = Runtime(0);
        movie.genres.clear();
        let json = serde_json::to_value(&movie).unwrap();
        assert!(json.get("year").is_none());
        assert!(json.get("runtime").is_none());
        assert!(json.get("genres").is_none());
    }

    #[test]
    fn validation_reports_each_failing_field_once() {
        let mut v = Validator::new();
        validate_movie(&mut v, &MovieInput::default().into_movie());
        let errors = v.into_errors();
        assert_eq!(errors["title"], "must be provided");
        assert_eq!(errors["year"], "must be provided");
        assert_eq!(errors["runtime"], "must be provided");
        assert_eq!(errors["genres"], "must contain at least 1 genre");

        let mut v = Validator::new();
        let mut movie = casablanca();
        movie.genres = vec!["drama".into(), "drama".into()];
        movie.year = current_year() + 1;
        validate_movie(&mut v, &movie);
        assert_eq!(v.errors()["genres"], "must not contain duplicate values");
        assert_eq!(v.errors()["year"], "must not be in the future");

        let mut v = Validator::new();
        validate_movie(&mut v, &casablanca());
        assert!(v.valid());
    }

    #[test]
    fn missing_genres_differ_from_empty_genres() {
        let input = MovieInput {
            title: Some("x".into()),
            year: Some(2000),
            runtime: Some(Runtime(90)),
            genres: None,
        };
        let mut v = Validator::new();
        validate_movie_input(&mut v, &input);
        validate_movie(&mut v, &input.into_movie());
        assert_eq!(v.into_errors()["genres"], "must be provided");

        let input = MovieInput {
            genres: Some(Vec::new()),
            ..MovieInput::default()
        };
        let mut v = Validator::new();
        validate_movie_input(&mut v, &input);
        validate_movie(&mut v, &input.into_movie());
        assert_eq!(v.into_errors()["genres"], "must contain at least 1 genre");
    }

    #[test]
    fn stale_version_is_an_edit_conflict() {
        let store = MovieStore::new();
        let saved = store.insert(casablanca()).unwrap();
        assert_eq!(saved.id, 1);
        assert_eq!(saved.version, 1);

        let mut first = saved.clone();
        first.title = "Casablanca (1942)".into();
        let updated = store.update(first).unwrap();
        assert_eq!(updated.version, 2);

        let mut stale = saved;
        stale.title = "lost write".into();
        assert!(matches!(store.update(stale), Err(StoreError::EditConflict)));
        assert_eq!(store.get(1).unwrap().unwrap().title, "Casablanca (1942)");
    }

    #[test]
    fn delete_reports_absence() {
        let store = MovieStore::new();
        let saved = store.insert(casablanca()).unwrap();
        assert!(store.delete(saved.id).unwrap());
        assert!(!store.delete(saved.id).unwrap());
        assert!(store.list().unwrap().is_empty());
    }
}
