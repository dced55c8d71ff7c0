use sea_orm_migration::{prelude::*, schema::*};

use crate::{m20240301_000001_create_users::Users, m20240301_000002_create_movies::Movies};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MovieRating::Table)
                    .if_not_exists()
                    .col(pk_auto(MovieRating::Id))
                    .col(integer(MovieRating::UserId))
                    .col(integer(MovieRating::MovieId))
                    .col(
                        integer_null(MovieRating::Rating)
                            .check(Expr::col(MovieRating::Rating).between(0, 10)),
                    )
                    .col(string_len_null(MovieRating::Review, 512))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movierating_user")
                            .from(MovieRating::Table, MovieRating::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movierating_movie")
                            .from(MovieRating::Table, MovieRating::MovieId)
                            .to(Movies::Table, Movies::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Not unique: one row per (user, movie) is kept by the rating handler only.
        manager
            .create_index(
                Index::create()
                    .name("idx_movierating_user_movie")
                    .table(MovieRating::Table)
                    .col(MovieRating::UserId)
                    .col(MovieRating::MovieId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movierating_movie")
                    .table(MovieRating::Table)
                    .col(MovieRating::MovieId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(MovieRating::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum MovieRating {
    #[sea_orm(iden = "movierating")]
    Table,
    Id,
    UserId,
    MovieId,
    Rating,
    Review,
}
