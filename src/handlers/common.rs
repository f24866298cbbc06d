use crate::{auth::AuthUser, errors::ServiceError, PaginatedResponse};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;
const MAX_ROW_OFFSET: u64 = i64::MAX as u64;

/// Normalizes optional `page`/`limit` query values. Pages whose row offset
/// does not fit a signed 64-bit SQL `OFFSET` are rejected.
pub fn page_and_limit(page: Option<u64>, limit: Option<u64>) -> Result<(u64, u64), ServiceError> {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1).checked_mul(limit);
    if !offset.is_some_and(|rows| rows <= MAX_ROW_OFFSET) {
        return Err(ServiceError::BadRequest(format!(
            "page {} is out of range",
            page
        )));
    }
    Ok((page, limit))
}

pub fn paginated<T>(items: Vec<T>, total: u64, page: u64, limit: u64) -> PaginatedResponse<T> {
    PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages: total.div_ceil(limit.max(1)),
    }
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))
}

/// Id of the authenticated caller.
pub fn caller_id(user: &AuthUser) -> Result<Uuid, ServiceError> {
    user.user_uuid()
        .map_err(|_| ServiceError::Unauthorized("Invalid subject in token".to_string()))
}

/// Body of the archive endpoints. An empty body archives.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ArchiveRequest {
    #[serde(default = "default_archive")]
    #[schema(example = true)]
    pub archive: bool,
}

impl Default for ArchiveRequest {
    fn default() -> Self {
        Self { archive: true }
    }
}

fn default_archive() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case(None, None, (1, 20))]
    #[case(Some(0), Some(0), (1, 1))]
    #[case(Some(3), Some(500), (3, 100))]
    fn page_and_limit_are_clamped(
        #[case] page: Option<u64>,
        #[case] limit: Option<u64>,
        #[case] expected: (u64, u64),
    ) {
        assert_eq!(page_and_limit(page, limit).unwrap(), expected);
    }

    #[test]
    fn pages_past_the_addressable_offset_are_rejected() {
        assert_matches!(
            page_and_limit(Some(u64::MAX), Some(MAX_PAGE_SIZE)),
            Err(ServiceError::BadRequest(_))
        );
        let last = MAX_ROW_OFFSET / MAX_PAGE_SIZE + 1;
        assert_eq!(
            page_and_limit(Some(last), Some(MAX_PAGE_SIZE)).unwrap(),
            (last, MAX_PAGE_SIZE)
        );
        assert_matches!(
            page_and_limit(Some(last + 1), Some(MAX_PAGE_SIZE)),
            Err(ServiceError::BadRequest(_))
        );
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = paginated(vec![1, 2], 41, 1, 20);
        assert_eq!(page.total_pages, 3);
        assert_eq!(paginated::<u8>(vec![], 0, 1, 20).total_pages, 0);
    }

    #[test]
    fn archive_defaults_to_true() {
        let body: ArchiveRequest = serde_json::from_str("{}").unwrap();
        assert!(body.archive);
    }
}
