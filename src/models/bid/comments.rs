use sqlx::PgPool;

use crate::errors::AppError;
use super::types::Comment;

const SELECT_COMMENT: &str = "\
    SELECT c.id, c.bid_id, c.user_id, u.full_name AS user_name, c.content, \
           c.created_at, c.updated_at \
    FROM bid_comments c \
    LEFT JOIN users u ON u.id = c.user_id";

async fn bid_exists(pool: &PgPool, bid_id: i64) -> Result<bool, AppError> {
    let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM bids WHERE id = $1)")
        .bind(bid_id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

async fn find_by_id(pool: &PgPool, comment_id: i64) -> Result<Option<Comment>, AppError> {
    let comment = sqlx::query_as::<_, Comment>(&format!("{SELECT_COMMENT} WHERE c.id = $1"))
        .bind(comment_id)
        .fetch_optional(pool)
        .await?;
    Ok(comment)
}

/// Load a comment for modification by `user_id`: it must exist, belong to
/// `bid_id`, and have been written by that user.
async fn find_owned(
    pool: &PgPool,
    bid_id: i64,
    comment_id: i64,
    user_id: i64,
) -> Result<Comment, AppError> {
    let comment = find_by_id(pool, comment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment"))?;
    if comment.bid_id != bid_id {
        return Err(AppError::Validation(vec![
            "Comment does not belong to this bid".to_string(),
        ]));
    }
    if comment.user_id != Some(user_id) {
        return Err(AppError::PermissionDenied(
            "only the author can modify a comment".to_string(),
        ));
    }
    Ok(comment)
}

/// Comments of a bid, oldest first.
pub async fn list_comments(pool: &PgPool, bid_id: i64) -> Result<Vec<Comment>, AppError> {
    if !bid_exists(pool, bid_id).await? {
        return Err(AppError::not_found("Bid"));
    }
    let comments = sqlx::query_as::<_, Comment>(&format!(
        "{SELECT_COMMENT} WHERE c.bid_id = $1 ORDER BY c.created_at, c.id"
    ))
    .bind(bid_id)
    .fetch_all(pool)
    .await?;
    Ok(comments)
}

pub async fn add_comment(
    pool: &PgPool,
    bid_id: i64,
    user_id: i64,
    content: &str,
) -> Result<Comment, AppError> {
    if !bid_exists(pool, bid_id).await? {
        return Err(AppError::not_found("Bid"));
    }
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO bid_comments (bid_id, user_id, content) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(bid_id)
    .bind(user_id)
    .bind(content)
    .fetch_one(pool)
    .await?;

    find_by_id(pool, id).await?.ok_or_else(|| AppError::not_found("Comment"))
}

pub async fn update_comment(
    pool: &PgPool,
    bid_id: i64,
    comment_id: i64,
    user_id: i64,
    content: &str,
) -> Result<Comment, AppError> {
    find_owned(pool, bid_id, comment_id, user_id).await?;
    sqlx::query("UPDATE bid_comments SET content = $1, updated_at = NOW() WHERE id = $2")
        .bind(content)
        .bind(comment_id)
        .execute(pool)
        .await?;

    find_by_id(pool, comment_id).await?.ok_or_else(|| AppError::not_found("Comment"))
}

/// Delete a comment; returns what was removed so the caller can audit it.
pub async fn delete_comment(
    pool: &PgPool,
    bid_id: i64,
    comment_id: i64,
    user_id: i64,
) -> Result<Comment, AppError> {
    let comment = find_owned(pool, bid_id, comment_id, user_id).await?;
    sqlx::query("DELETE FROM bid_comments WHERE id = $1")
        .bind(comment_id)
        .execute(pool)
        .await?;
    log::info!("Deleted comment {comment_id} on bid {bid_id}");
    Ok(comment)
}
