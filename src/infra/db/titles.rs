use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::{
        CatalogCursor, CursorPage, MAX_CATALOG_PAGE_SIZE, PageRequest, PaginationError, SortValue,
    },
    application::repos::{
        CreateTitleParams, RepoError, TitleQuery, TitlesRepo, TitlesWriteRepo, UpdateTitleParams,
    },
    domain::entities::TitleRecord,
    domain::types::{SortDirection, SortField, TitleStatus},
};

use super::{PostgresRepositories, map_sqlx_error, util::contains_pattern};

pub(super) const TITLE_COLUMNS: &str = "id, title, alternative_title, description, author, \
    artist, year, status, language, genres, cover_image, views, favorites_count, chapters_count, \
    ratings_count, rating, featured, created_at, last_updated";

#[derive(sqlx::FromRow)]
pub(super) struct TitleRow {
    id: Uuid,
    title: String,
    alternative_title: Option<String>,
    description: String,
    author: Option<String>,
    artist: Option<String>,
    year: Option<i32>,
    status: TitleStatus,
    language: String,
    genres: Vec<String>,
    cover_image: Option<String>,
    views: i64,
    favorites_count: i64,
    chapters_count: Option<i64>,
    ratings_count: i64,
    rating: f64,
    featured: bool,
    created_at: OffsetDateTime,
    last_updated: OffsetDateTime,
}

impl From<TitleRow> for TitleRecord {
    fn from(row: TitleRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            alternative_title: row.alternative_title,
            description: row.description,
            author: row.author,
            artist: row.artist,
            year: row.year,
            status: row.status,
            language: row.language,
            genres: row.genres,
            cover_image: row.cover_image,
            views: row.views,
            favorites_count: row.favorites_count,
            chapters_count: row.chapters_count,
            ratings_count: row.ratings_count,
            rating: row.rating,
            featured: row.featured,
            created_at: row.created_at,
            last_updated: row.last_updated,
        }
    }
}

fn sort_column(sort: SortField) -> &'static str {
    match sort {
        SortField::Latest => "created_at",
        SortField::Popular => "views",
        SortField::Rating => "rating",
        SortField::Title => "title",
        SortField::Chapters => "COALESCE(chapters_count, 0)",
    }
}

fn comparison(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => " > ",
        SortDirection::Desc => " < ",
    }
}

fn push_sort_value(
    qb: &mut QueryBuilder<'_, Postgres>,
    sort: SortField,
    value: &SortValue,
) -> Result<(), RepoError> {
    match (sort, value) {
        (SortField::Latest, SortValue::Time(at)) => {
            qb.push_bind(*at);
        }
        (SortField::Popular | SortField::Chapters, SortValue::Int(count)) => {
            qb.push_bind(*count);
        }
        (SortField::Rating, SortValue::Float(rating)) => {
            qb.push_bind(*rating);
        }
        (SortField::Title, SortValue::Text(text)) => {
            qb.push_bind(text.clone());
        }
        _ => {
            return Err(PaginationError::InvalidCursor(format!(
                "cursor value does not fit `{}` ordering",
                sort.as_str()
            ))
            .into());
        }
    }
    Ok(())
}

#[async_trait]
impl TitlesRepo for PostgresRepositories {
    async fn list_titles(
        &self,
        query: &TitleQuery,
        page: PageRequest<CatalogCursor>,
    ) -> Result<CursorPage<TitleRecord>, RepoError> {
        let limit = page.limit.clamp(1, MAX_CATALOG_PAGE_SIZE);
        let column = sort_column(query.sort);
        let direction = query.direction;

        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {TITLE_COLUMNS} FROM titles WHERE 1=1 "));

        if let Some(genre) = query.genre.as_ref() {
            qb.push(" AND genres @> ");
            qb.push_bind(vec![genre.clone()]);
        }

        if let Some(ids) = query.ids.as_ref() {
            qb.push(" AND id = ANY(");
            qb.push_bind(ids.clone());
            qb.push(")");
        }

        if let Some(search) = query.search.as_ref() {
            let pattern = contains_pattern(search);
            qb.push(" AND (title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(r" ESCAPE '\' OR description ILIKE ");
            qb.push_bind(pattern);
            qb.push(r" ESCAPE '\')");
        }

        if let Some(cursor) = page.cursor.as_ref() {
            if !cursor.matches(query.sort, direction) {
                return Err(PaginationError::InvalidCursor(
                    "cursor was issued for another ordering".to_string(),
                )
                .into());
            }
            qb.push(" AND (");
            qb.push(column);
            qb.push(comparison(direction));
            push_sort_value(&mut qb, query.sort, cursor.value())?;
            qb.push(" OR (");
            qb.push(column);
            qb.push(" = ");
            push_sort_value(&mut qb, query.sort, cursor.value())?;
            qb.push(" AND id");
            qb.push(comparison(direction));
            qb.push_bind(cursor.id());
            qb.push("))");
        }

        qb.push(" ORDER BY ");
        qb.push(column);
        qb.push(" ");
        qb.push(direction.as_sql());
        qb.push(", id ");
        qb.push(direction.as_sql());
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<TitleRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let items: Vec<TitleRecord> = rows.into_iter().map(TitleRecord::from).collect();
        let next_cursor = if items.len() as u32 == limit {
            items
                .last()
                .map(|last| CatalogCursor::after(last, query.sort, direction).encode())
        } else {
            None
        };

        Ok(CursorPage::new(items, next_cursor))
    }

    async fn find_title(&self, id: Uuid) -> Result<Option<TitleRecord>, RepoError> {
        let row = sqlx::query_as::<_, TitleRow>(&format!(
            "SELECT {TITLE_COLUMNS} FROM titles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TitleRecord::from))
    }

    async fn find_featured(&self) -> Result<Option<TitleRecord>, RepoError> {
        let row = sqlx::query_as::<_, TitleRow>(&format!(
            "SELECT {TITLE_COLUMNS} FROM titles WHERE featured \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TitleRecord::from))
    }

    async fn increment_title_views(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE titles SET views = views + 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl TitlesWriteRepo for PostgresRepositories {
    async fn create_title(&self, params: CreateTitleParams) -> Result<TitleRecord, RepoError> {
        let row = sqlx::query_as::<_, TitleRow>(&format!(
            "INSERT INTO titles (id, title, alternative_title, description, author, artist, year, \
             status, language, genres, cover_image, featured, chapters_count) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 0) \
             RETURNING {TITLE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(params.title)
        .bind(params.alternative_title)
        .bind(params.description)
        .bind(params.author)
        .bind(params.artist)
        .bind(params.year)
        .bind(params.status)
        .bind(params.language)
        .bind(params.genres)
        .bind(params.cover_image)
        .bind(params.featured)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(TitleRecord::from(row))
    }

    async fn update_title(&self, params: UpdateTitleParams) -> Result<TitleRecord, RepoError> {
        let row = sqlx::query_as::<_, TitleRow>(&format!(
            "UPDATE titles SET title = $2, alternative_title = $3, description = $4, \
             author = $5, artist = $6, year = $7, status = $8, language = $9, genres = $10, \
             last_updated = now() \
             WHERE id = $1 RETURNING {TITLE_COLUMNS}"
        ))
        .bind(params.id)
        .bind(params.title)
        .bind(params.alternative_title)
        .bind(params.description)
        .bind(params.author)
        .bind(params.artist)
        .bind(params.year)
        .bind(params.status)
        .bind(params.language)
        .bind(params.genres)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(TitleRecord::from).ok_or(RepoError::NotFound)
    }

    async fn set_featured(&self, id: Uuid, featured: bool) -> Result<TitleRecord, RepoError> {
        let row = sqlx::query_as::<_, TitleRow>(&format!(
            "UPDATE titles SET featured = $2 WHERE id = $1 RETURNING {TITLE_COLUMNS}"
        ))
        .bind(id)
        .bind(featured)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(TitleRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_title(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;

        // Chapters, comments, ratings and progress rows go with the title via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM titles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        sqlx::query(
            "UPDATE users SET favorites = array_remove(favorites, $1), updated_at = now() \
             WHERE $1 = ANY(favorites)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
