use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    response::Response,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, Func, SimpleExpr},
};
use tracing::info;

use super::{created, is_truthy};
use crate::{
    AppState,
    auth::CurrentUser,
    entities::{
        movie,
        movie_rating::{self, MAX_RATING, MAX_REVIEW_LEN},
        user,
    },
    error::{AppError, AppResult},
    models::{
        AggregateQuery, MovieRatingsResponse, RateRequest, RateResponse, RatingEntry,
        RatingResponse, RatingSummary,
    },
};

/// Creates or amends the caller's rating for a movie. The lookup and the write
/// are separate statements, so two concurrent first ratings by the same user
/// can both insert.
pub async fn rate_movie(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(rater)): Extension<CurrentUser>,
    Path(movie_id): Path<i32>,
    payload: Result<Json<RateRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(req) = payload?;

    let rating = match req.rating {
        Some(raw) => {
            let rating = raw.to_i32("rating").map_err(AppError::InvalidInput)?;
            if !(0..=MAX_RATING).contains(&rating) {
                return Err(AppError::invalid(format!("rating must be between 0 and {MAX_RATING}")));
            }
            Some(rating)
        },
        None => None,
    };
    let review = req.review.filter(|r| !r.is_empty());
    if rating.is_none() && review.is_none() {
        return Err(AppError::invalid("rating or review is required"));
    }
    if review.as_ref().is_some_and(|r| r.chars().count() > MAX_REVIEW_LEN) {
        return Err(AppError::invalid(format!(
            "review must be at most {MAX_REVIEW_LEN} characters"
        )));
    }

    let txn = state.db.begin().await?;
    let movie = find_movie(&txn, movie_id).await?;

    let existing = movie_rating::Entity::find()
        .filter(movie_rating::Column::UserId.eq(rater.id))
        .filter(movie_rating::Column::MovieId.eq(movie_id))
        .order_by_asc(movie_rating::Column::Id)
        .one(&txn)
        .await?;

    let saved = match existing {
        Some(existing) => {
            let mut active: movie_rating::ActiveModel = existing.into();
            if let Some(rating) = rating {
                active.rating = Set(Some(rating));
            }
            if let Some(review) = review {
                active.review = Set(Some(review));
            }
            active.update(&txn).await?
        },
        None => {
            movie_rating::ActiveModel {
                user_id: Set(rater.id),
                movie_id: Set(movie_id),
                rating: Set(rating),
                review: Set(review),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        },
    };

    txn.commit().await?;

    info!(
        rating_id = saved.id,
        user_id = rater.id,
        movie_id,
        rating = ?saved.rating,
        "movie rated"
    );

    Ok(created(
        format!("/ratings/{}", saved.id),
        RateResponse { name: movie.name, rating: saved.rating, review: saved.review },
    ))
}

/// Aggregate view of a movie's ratings. The first truthy flag among
/// avg, rates and reviews picks the shape; without one, every row is listed.
pub async fn movie_ratings(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<i32>,
    Query(query): Query<AggregateQuery>,
) -> AppResult<Json<MovieRatingsResponse>> {
    let txn = state.db.begin().await?;
    let movie = find_movie(&txn, movie_id).await?;

    let of_movie = movie_rating::Entity::find().filter(movie_rating::Column::MovieId.eq(movie_id));

    let summary = if is_truthy(query.avg.as_deref()) {
        let average: Option<Option<f64>> = of_movie
            .select_only()
            .column_as(
                SimpleExpr::from(Func::avg(Expr::col(movie_rating::Column::Rating))),
                "average",
            )
            .into_tuple()
            .one(&txn)
            .await?;
        RatingSummary::Average(average.flatten())
    } else if is_truthy(query.rates.as_deref()) {
        let count =
            of_movie.filter(movie_rating::Column::Rating.is_not_null()).count(&txn).await?;
        RatingSummary::Rates(count)
    } else if is_truthy(query.reviews.as_deref()) {
        let count =
            of_movie.filter(movie_rating::Column::Review.is_not_null()).count(&txn).await?;
        RatingSummary::Reviews(count)
    } else {
        let rows = of_movie.order_by_asc(movie_rating::Column::Id).all(&txn).await?;
        RatingSummary::All(rows.into_iter().map(RatingEntry::from).collect())
    };

    txn.commit().await?;

    Ok(Json(MovieRatingsResponse { movie: movie.name, summary }))
}

pub async fn get_rating(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> AppResult<Json<RatingResponse>> {
    let txn = state.db.begin().await?;

    let rating = movie_rating::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::invalid(format!("rating {id} not found")))?;

    let movie = movie::Entity::find_by_id(rating.movie_id)
        .one(&txn)
        .await?
        .ok_or_else(|| anyhow!("rating {id} references missing movie {}", rating.movie_id))?;
    let rater = user::Entity::find_by_id(rating.user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| anyhow!("rating {id} references missing user {}", rating.user_id))?;

    txn.commit().await?;

    Ok(Json(RatingResponse {
        movie: movie.name,
        user: rater.username,
        rating: rating.rating,
        review: rating.review,
    }))
}

async fn find_movie(txn: &DatabaseTransaction, id: i32) -> AppResult<movie::Model> {
    movie::Entity::find_by_id(id)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::invalid(format!("movie {id} not found")))
}
