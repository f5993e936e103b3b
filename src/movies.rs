//! Sample movie resource.
//!
//! | Route | Body | Result |
//! |---|---|---|
//! | `GET /movies` | optional `{"limit": n, "offset": n}` | page of movies |
//! | `GET /movies/{id}` | none | one movie, or 404 |
//! | `POST /movies` | `{"title": "...", "release_date": "..."}` | the stored movie |

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{HandlerError, HandlerResult};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    pub release_date: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewMovie {
    pub title: String,
    pub release_date: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListParams {
    /// Requested limit, defaulted and capped.
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

/// Persistence for [`Movie`] rows.
pub trait MovieStore: Send + Sync + 'static {
    /// Movies ordered by id.
    fn list(&self, offset: usize, limit: usize) -> Vec<Movie>;
    fn get(&self, id: u64) -> Option<Movie>;
    /// Stores `movie` under a fresh id and returns the stored row.
    fn create(&self, movie: NewMovie) -> Movie;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryMovies {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    rows: BTreeMap<u64, Movie>,
    last_id: u64,
}

impl InMemoryMovies {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the first 23 MCU releases, starting with id 1.
    pub fn seeded() -> Self {
        let store = Self::new();
        let seed = [
            ("Iron Man", (2008, 5, 2)),
            ("The Incredible Hulk", (2008, 6, 13)),
            ("Iron Man 2", (2010, 5, 7)),
            ("Thor", (2011, 5, 6)),
            ("Captain America: The First Avenger", (2011, 7, 22)),
            ("The Avengers", (2012, 5, 4)),
            ("Iron Man 3", (2013, 5, 3)),
            ("Thor: The Dark World", (2013, 11, 8)),
            ("Captain America: The Winter Soldier", (2014, 4, 4)),
            ("Guardians of the Galaxy", (2014, 8, 1)),
            ("Avengers: Age of Ultron", (2015, 5, 1)),
            ("Ant-Man", (2015, 7, 17)),
            ("Captain America: Civil War", (2016, 5, 6)),
            ("Doctor Strange", (2016, 11, 4)),
            ("Guardians of the Galaxy Vol. 2", (2017, 5, 5)),
            ("Spider-Man: Homecoming", (2017, 7, 7)),
            ("Thor: Ragnarok", (2017, 11, 3)),
            ("Black Panther", (2018, 2, 16)),
            ("Avengers: Infinity War", (2018, 4, 27)),
            ("Ant-Man and the Wasp", (2018, 7, 6)),
            ("Captain Marvel", (2019, 3, 8)),
            ("Avengers: Endgame", (2019, 4, 26)),
            ("Spider-Man: Far From Home", (2019, 7, 2)),
        ];
        for (title, (y, m, d)) in seed {
            if let Some(release_date) = Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).single() {
                store.create(NewMovie { title: title.to_owned(), release_date });
            }
        }
        store
    }
}

impl MovieStore for InMemoryMovies {
    fn list(&self, offset: usize, limit: usize) -> Vec<Movie> {
        self.state.read().rows.values().skip(offset).take(limit).cloned().collect()
    }

    fn get(&self, id: u64) -> Option<Movie> {
        self.state.read().rows.get(&id).cloned()
    }

    fn create(&self, movie: NewMovie) -> Movie {
        let mut state = self.state.write();
        state.last_id += 1;
        let row = Movie { id: state.last_id, title: movie.title, release_date: movie.release_date };
        state.rows.insert(row.id, row.clone());
        row
    }
}

/// Registers the movie routes on `router`.
pub fn routes(router: Router) -> Router {
    router
        .get("/movies", list)
        .post("/movies", create)
        .get("/movies/{id}", retrieve)
}

pub async fn list(req: Request) -> HandlerResult {
    let params: ListParams = req.bind()?;
    let movies = req.app().movies().list(params.offset(), params.limit());
    Response::json(&movies)
}

pub async fn retrieve(req: Request) -> HandlerResult {
    let raw = req.param("id").unwrap_or_default();
    let id: u64 = raw
        .parse()
        .map_err(|_| HandlerError::invalid(format!("invalid movie id `{raw}`")))?;

    match req.app().movies().get(id) {
        Some(movie) => Response::json(&movie),
        None => Err(HandlerError::not_found("movie not found")),
    }
}

pub async fn create(req: Request) -> HandlerResult {
    let mut movie: NewMovie = req.bind()?;
    movie.title = movie.title.trim().to_owned();
    if movie.title.is_empty() {
        return Err(HandlerError::invalid("title is required"));
    }
    let stored = req.app().movies().create(movie);
    tracing::debug!(id = stored.id, "movie created");
    Response::json(&stored)
}
