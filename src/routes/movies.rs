use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    response::Response,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, JoinType, Order, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Select, Set, TransactionTrait,
    sea_query::{Alias, Expr, Func, SimpleExpr},
};
use tracing::{debug, info};

use super::{created, non_empty, parse_param};
use crate::{
    AppState,
    entities::{movie, movie_rating},
    error::{AppError, AppResult},
    models::{
        MovieList, MovieResponse, MovieSummary, NewMovieRequest, NewMovieResponse, SearchQuery,
    },
};

const MAX_NAME_LEN: usize = 100;

pub async fn add_movie(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewMovieRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(req) = payload?;
    let (Some(name), Some(year)) = (req.name, req.year) else {
        return Err(AppError::invalid("name and year are required"));
    };
    let year = year.to_i32("year").map_err(AppError::InvalidInput)?;
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::invalid(format!("name must be at most {MAX_NAME_LEN} characters")));
    }

    let txn = state.db.begin().await?;

    let existing = movie::Entity::find()
        .filter(movie::Column::Name.eq(&name))
        .filter(movie::Column::Year.eq(year))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(AppError::conflict(format!("movie {name} ({year}) already exists")));
    }

    let movie = movie::ActiveModel { name: Set(name), year: Set(Some(year)), ..Default::default() }
        .insert(&txn)
        .await?;

    txn.commit().await?;

    info!(movie_id = movie.id, name = %movie.name, year, "movie added");

    Ok(created(
        format!("/movies/{}", movie.id),
        NewMovieResponse { id: movie.id, movie: movie.name, year },
    ))
}

pub async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> AppResult<Json<MovieResponse>> {
    let txn = state.db.begin().await?;
    let movie = movie::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::invalid(format!("movie {id} not found")))?;
    txn.commit().await?;

    Ok(Json(MovieResponse { movie: movie.name, year: movie.year }))
}

/// Which search mode a request selects. Only the first non-empty parameter in
/// the order filter, year, top is honored.
#[derive(Clone, Debug, PartialEq)]
enum Selection {
    NameContains(String),
    Year(i32),
    Top(u32),
    All,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct PageWindow {
    page: u32,
    size: u32,
}

impl PageWindow {
    /// Rows to skip, bounded so it still fits the `i64` SQLite binds.
    fn offset(self) -> AppResult<u64> {
        u64::from(self.page - 1)
            .checked_mul(u64::from(self.size))
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or_else(|| AppError::invalid("page is out of range"))
    }
}

impl SearchQuery {
    fn selection(&self) -> AppResult<Selection> {
        if let Some(needle) = non_empty(self.filter.clone()) {
            return Ok(Selection::NameContains(needle));
        }
        if let Some(year) = non_empty(self.year.clone()) {
            return Ok(Selection::Year(parse_param("year", &year)?));
        }
        if let Some(top) = non_empty(self.top.clone()) {
            return Ok(Selection::Top(parse_param("top", &top)?));
        }
        Ok(Selection::All)
    }

    /// Pagination applies only when both page and size are given.
    fn window(&self) -> AppResult<Option<PageWindow>> {
        let (Some(page), Some(size)) = (non_empty(self.page.clone()), non_empty(self.size.clone()))
        else {
            return Ok(None);
        };
        let page: u32 = parse_param("page", &page)?;
        let size: u32 = parse_param("size", &size)?;
        if page == 0 || size == 0 {
            return Err(AppError::invalid("page and size must be at least 1"));
        }
        Ok(Some(PageWindow { page, size }))
    }
}

pub async fn search_movies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<MovieList>> {
    let selection = query.selection()?;
    let window = query.window()?;
    debug!(?selection, ?window, "searching movies");

    let select = match &selection {
        Selection::NameContains(needle) => {
            movie::Entity::find().filter(name_contains(needle)).order_by_asc(movie::Column::Id)
        },
        Selection::Year(year) => movie::Entity::find()
            .filter(movie::Column::Year.eq(*year))
            .order_by_asc(movie::Column::Id),
        Selection::Top(_) => by_average_rating(),
        Selection::All => movie::Entity::find().order_by_asc(movie::Column::Id),
    };

    let select = match (window, &selection) {
        (Some(w), _) => select.offset(w.offset()?).limit(u64::from(w.size)),
        (None, Selection::Top(limit)) => select.limit(u64::from(*limit)),
        (None, _) => select,
    };

    let txn = state.db.begin().await?;
    let movies = select.all(&txn).await?;
    txn.commit().await?;

    Ok(Json(MovieList { movies: movies.into_iter().map(MovieSummary::from).collect() }))
}

/// Case-sensitive substring match. SQLite's `LIKE` folds ASCII case, `instr` does not.
fn name_contains(needle: &str) -> SimpleExpr {
    Expr::expr(
        Func::cust(Alias::new("instr"))
            .arg(Expr::col((movie::Entity, movie::Column::Name)))
            .arg(needle.to_owned()),
    )
    .gt(0)
}

/// Rated movies only, lowest average first.
fn by_average_rating() -> Select<movie::Entity> {
    let rating = Expr::col((movie_rating::Entity, movie_rating::Column::Rating));
    let average = SimpleExpr::from(Func::avg(rating));

    movie::Entity::find()
        .join(JoinType::InnerJoin, movie::Relation::MovieRating.def())
        .group_by(movie::Column::Id)
        .order_by(average, Order::Asc)
        .order_by_asc(movie::Column::Id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> SearchQuery {
        let mut q = SearchQuery::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "filter" => q.filter = v,
                "year" => q.year = v,
                "top" => q.top = v,
                "page" => q.page = v,
                "size" => q.size = v,
                _ => unreachable!(),
            }
        }
        q
    }

    #[test]
    fn substring_wins_over_year_and_top() {
        let q = query(&[("filter", "new"), ("year", "not-a-number"), ("top", "3")]);
        assert_eq!(q.selection().unwrap(), Selection::NameContains("new".to_string()));
    }

    #[test]
    fn year_wins_over_top() {
        let q = query(&[("year", "2021"), ("top", "3")]);
        assert_eq!(q.selection().unwrap(), Selection::Year(2021));
    }

    #[test]
    fn empty_filter_falls_through() {
        let q = query(&[("filter", ""), ("top", "2")]);
        assert_eq!(q.selection().unwrap(), Selection::Top(2));
    }

    #[test]
    fn no_params_selects_everything() {
        assert_eq!(SearchQuery::default().selection().unwrap(), Selection::All);
    }

    #[test]
    fn malformed_year_is_invalid() {
        assert!(query(&[("year", "twenty")]).selection().is_err());
    }

    #[test]
    fn window_needs_both_page_and_size() {
        assert_eq!(query(&[("page", "1")]).window().unwrap(), None);
        assert_eq!(
            query(&[("page", "2"), ("size", "5")]).window().unwrap(),
            Some(PageWindow { page: 2, size: 5 })
        );
    }

    #[test]
    fn oversized_window_values_are_invalid() {
        assert!(query(&[("page", "18446744073709551615"), ("size", "2")]).window().is_err());
        assert!(query(&[("top", "18446744073709551615")]).selection().is_err());
        let huge = query(&[("page", "4294967295"), ("size", "4294967295")]).window().unwrap();
        assert!(huge.unwrap().offset().is_err());
    }

    #[test]
    fn offset_skips_whole_pages() {
        assert_eq!(PageWindow { page: 3, size: 5 }.offset().unwrap(), 10);
    }

    #[test]
    fn whitespace_filter_is_a_search_term() {
        let q = query(&[("filter", " "), ("year", "2021")]);
        assert_eq!(q.selection().unwrap(), Selection::NameContains(" ".to_string()));
    }

    #[test]
    fn zero_page_is_rejected() {
        assert!(query(&[("page", "0"), ("size", "5")]).window().is_err());
    }
}
