use crate::application::accounts::{AccountError, IdentityError};
use crate::application::admin::chapters::AdminChapterError;
use crate::application::admin::statistics::AdminStatisticsError;
use crate::application::admin::titles::AdminTitleError;
use crate::application::admin::users::AdminUserError;
use crate::application::catalog::CatalogError;
use crate::application::comments::CommentError;
use crate::application::error::ErrorReport;
use crate::application::favorites::FavoriteError;
use crate::application::ratings::RatingError;
use crate::application::reading::ReadingError;
use crate::application::repos::RepoError;
use crate::application::uploads::ImageHostError;
use crate::domain::error::DomainError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_CURSOR: &str = "invalid_cursor";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const UPLOAD: &str = "upload_error";
    pub const IMAGE_HOST: &str = "image_host_unavailable";
    pub const IDENTITY: &str = "identity_unavailable";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn invalid_input(message: &'static str, hint: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            message,
            Some(hint.into()),
        )
    }

    pub fn invalid_cursor(hint: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_CURSOR,
            "Invalid cursor",
            Some(hint.into()),
        )
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Sign-in required",
            None,
        )
    }

    pub fn forbidden(message: &'static str) -> Self {
        Self::new(StatusCode::FORBIDDEN, codes::FORBIDDEN, message, None)
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn rate_limited(retry_after: u64) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: codes::RATE_LIMITED.to_string(),
                message: "Rate limit exceeded".to_string(),
                hint: Some(format!("Retry after {retry_after} seconds")),
            },
        };
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, value);
        }
        ErrorReport::from_message(
            "infra::http::api::rate_limit",
            StatusCode::TOO_MANY_REQUESTS,
            format!("rate_limited: retry_after={retry_after}"),
        )
        .attach(&mut response);
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = format!(
            "{}: {}",
            self.code,
            self.hint.as_deref().unwrap_or(self.message)
        );
        // Server-side details stay in the logs.
        let hint = if self.status.is_server_error() {
            None
        } else {
            self.hint
        };
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message("infra::http::api", self.status, detail).attach(&mut response);
        response
    }
}

pub fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::Pagination(p) => ApiError::invalid_cursor(p.to_string()),
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::InvalidInput { message } => {
            ApiError::invalid_input("Invalid input", message)
        }
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(message) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(message),
        ),
    }
}

pub fn domain_to_api(err: DomainError) -> ApiError {
    match err {
        DomainError::NotFound { entity } => ApiError::new(
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            "Resource not found",
            Some(entity.to_string()),
        ),
        DomainError::Validation { .. } => ApiError::invalid_input("Invalid input", err.to_string()),
        DomainError::Invariant { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Request conflicts with stored data",
            Some(message),
        ),
    }
}

pub fn identity_to_api(err: IdentityError) -> ApiError {
    match err {
        IdentityError::Missing => ApiError::unauthorized(),
        IdentityError::Invalid(reason) => ApiError::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Identity token rejected",
            Some(reason),
        ),
        IdentityError::Unavailable(reason) => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::IDENTITY,
            "Identity provider unavailable",
            Some(reason),
        ),
    }
}

pub fn image_to_api(err: ImageHostError) -> ApiError {
    match err {
        ImageHostError::Empty { .. }
        | ImageHostError::TooLarge { .. }
        | ImageHostError::NotAnImage { .. } => {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::UPLOAD,
                "Image rejected",
                Some(err.to_string()),
            )
        }
        ImageHostError::Unconfigured
        | ImageHostError::Rejected(_)
        | ImageHostError::Transport(_) => ApiError::new(
            StatusCode::BAD_GATEWAY,
            codes::IMAGE_HOST,
            "Image host failed",
            Some(err.to_string()),
        ),
    }
}

pub fn account_to_api(err: AccountError) -> ApiError {
    match err {
        AccountError::Identity(identity) => identity_to_api(identity),
        AccountError::Validation { .. } => ApiError::invalid_input("Invalid profile", err.to_string()),
        AccountError::NotFound => ApiError::not_found("user not found"),
        AccountError::Repo(repo) => repo_to_api(repo),
    }
}

pub fn catalog_to_api(err: CatalogError) -> ApiError {
    match err {
        CatalogError::CursorMismatch => ApiError::invalid_cursor(err.to_string()),
        CatalogError::UnknownGenre(_) => ApiError::invalid_input("Unknown genre", err.to_string()),
        CatalogError::NotFound => ApiError::not_found("title not found"),
        CatalogError::Repo(repo) => repo_to_api(repo),
    }
}

pub fn rating_to_api(err: RatingError) -> ApiError {
    match err {
        RatingError::NotFound => ApiError::not_found("title not found"),
        RatingError::Domain(domain) => domain_to_api(domain),
        RatingError::Repo(repo) => repo_to_api(repo),
    }
}

pub fn comment_to_api(err: CommentError) -> ApiError {
    match err {
        CommentError::ChapterNotFound => ApiError::not_found("chapter not found"),
        CommentError::CommentNotFound => ApiError::not_found("comment not found"),
        CommentError::Forbidden => {
            ApiError::forbidden("Only the author or an administrator may delete this comment")
        }
        CommentError::Domain(domain) => domain_to_api(domain),
        CommentError::Repo(repo) => repo_to_api(repo),
    }
}

pub fn reading_to_api(err: ReadingError) -> ApiError {
    match err {
        ReadingError::TitleNotFound => ApiError::not_found("title not found"),
        ReadingError::ChapterNotFound => ApiError::not_found("chapter not found"),
        ReadingError::Repo(repo) => repo_to_api(repo),
    }
}

pub fn favorite_to_api(err: FavoriteError) -> ApiError {
    match err {
        FavoriteError::TitleNotFound => ApiError::not_found("title not found"),
        FavoriteError::Repo(repo) => repo_to_api(repo),
    }
}

pub fn admin_title_to_api(err: AdminTitleError) -> ApiError {
    match err {
        AdminTitleError::ConstraintViolation(field) => {
            ApiError::invalid_input("Invalid title", field)
        }
        AdminTitleError::NotFound => ApiError::not_found("title not found"),
        AdminTitleError::Image(image) => image_to_api(image),
        AdminTitleError::Domain(domain) => domain_to_api(domain),
        AdminTitleError::Repo(repo) => repo_to_api(repo),
    }
}

pub fn admin_chapter_to_api(err: AdminChapterError) -> ApiError {
    match err {
        AdminChapterError::ConstraintViolation(field) => {
            ApiError::invalid_input("Invalid chapter", field)
        }
        AdminChapterError::TitleNotFound => ApiError::not_found("title not found"),
        AdminChapterError::ChapterNotFound => ApiError::not_found("chapter not found"),
        AdminChapterError::Image(image) => image_to_api(image),
        AdminChapterError::Repo(repo) => repo_to_api(repo),
    }
}

pub fn admin_user_to_api(err: AdminUserError) -> ApiError {
    match err {
        AdminUserError::NotFound => ApiError::not_found("user not found"),
        AdminUserError::SelfDemotion => {
            ApiError::forbidden("Administrators cannot revoke their own role")
        }
        AdminUserError::Repo(repo) => repo_to_api(repo),
    }
}

pub fn admin_statistics_to_api(err: AdminStatisticsError) -> ApiError {
    match err {
        AdminStatisticsError::Repo(repo) => repo_to_api(repo),
    }
}
