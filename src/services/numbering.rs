//! Sequential document numbers of the form `<PREFIX>-<YYYYMM>-<NNNN>`.
//!
//! The next number is derived from the highest stored number sharing the
//! prefix and month. Nothing locks the sequence: callers generate inside the
//! transaction that inserts the row, and two concurrent writers can still read
//! the same maximum.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use tracing::{debug, instrument};

use crate::db::DbPool;
use crate::entities::{asset, document, document::DocumentKind};
use crate::errors::ServiceError;

/// Width of the zero-padded suffix
pub const SUFFIX_WIDTH: usize = 4;
/// Highest suffix that keeps lexicographic order intact
pub const MAX_SEQUENCE: u32 = 9999;
/// Prefix used for asset tags
pub const ASSET_TAG_PREFIX: &str = "AS";

/// Table a sequence is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberScope {
    Documents,
    Assets,
}

/// `"<kind_prefix>-<YYYY><MM>-"`
pub fn prefix_for(kind_prefix: &str, date: NaiveDate) -> String {
    format!("{}-{:04}{:02}-", kind_prefix, date.year(), date.month())
}

pub fn format_number(prefix: &str, sequence: u32) -> String {
    format!("{}{:0width$}", prefix, sequence, width = SUFFIX_WIDTH)
}

/// Numeric suffix after the last `-`, if it is made of ASCII digits only.
pub fn parse_suffix(number: &str) -> Option<u32> {
    let (_, suffix) = number.rsplit_once('-')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Computes the number following `last` within `prefix`.
pub fn next_in_sequence(prefix: &str, last: Option<&str>) -> Result<String, ServiceError> {
    let next = match last {
        None => 1,
        Some(number) => {
            let current = parse_suffix(number).ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Stored number {} has a non-numeric suffix",
                    number
                ))
            })?;
            if current >= MAX_SEQUENCE {
                return Err(ServiceError::Conflict(format!(
                    "Number sequence {} is exhausted",
                    prefix.trim_end_matches('-')
                )));
            }
            current + 1
        }
    };
    Ok(format_number(prefix, next))
}

async fn last_number<C>(
    conn: &C,
    scope: NumberScope,
    prefix: &str,
) -> Result<Option<String>, ServiceError>
where
    C: ConnectionTrait,
{
    let last = match scope {
        NumberScope::Documents => {
            document::Entity::find()
                .select_only()
                .column(document::Column::Number)
                .filter(document::Column::Number.starts_with(prefix))
                .order_by_desc(document::Column::Number)
                .into_tuple::<String>()
                .one(conn)
                .await?
        }
        NumberScope::Assets => {
            asset::Entity::find()
                .select_only()
                .column(asset::Column::AssetTag)
                .filter(asset::Column::AssetTag.starts_with(prefix))
                .order_by_desc(asset::Column::AssetTag)
                .into_tuple::<String>()
                .one(conn)
                .await?
        }
    };
    Ok(last)
}

/// Generates the next number for `kind_prefix` in the month of `date`.
///
/// Generic over the connection so the writer can call it with its open
/// transaction.
pub async fn next_number<C>(
    conn: &C,
    scope: NumberScope,
    kind_prefix: &str,
    date: NaiveDate,
) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    let prefix = prefix_for(kind_prefix, date);
    let last = last_number(conn, scope, &prefix).await?;
    let number = next_in_sequence(&prefix, last.as_deref())?;
    debug!(%prefix, previous = ?last, %number, "generated number");
    Ok(number)
}

pub async fn next_document_number<C>(
    conn: &C,
    kind: DocumentKind,
    date: NaiveDate,
) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    next_number(conn, NumberScope::Documents, kind.prefix(), date).await
}

pub async fn next_asset_tag<C>(conn: &C, date: NaiveDate) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    next_number(conn, NumberScope::Assets, ASSET_TAG_PREFIX, date).await
}

/// Read-only numbering lookups
#[derive(Clone)]
pub struct NumberingService {
    db_pool: Arc<DbPool>,
}

impl NumberingService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// The number the next document of `kind` dated `date` would receive.
    /// Nothing is reserved.
    #[instrument(skip(self))]
    pub async fn preview(&self, kind: DocumentKind, date: NaiveDate) -> Result<String, ServiceError> {
        next_document_number(self.db_pool.as_ref(), kind, date).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn prefix_uses_year_and_zero_padded_month() {
        assert_eq!(prefix_for("BN", date(2024, 3, 15)), "BN-202403-");
        assert_eq!(prefix_for("INV", date(2023, 12, 1)), "INV-202312-");
    }

    #[rstest]
    #[case("BN-202403-0001", Some(1))]
    #[case("BN-202403-0042", Some(42))]
    #[case("INV-202312-9999", Some(9999))]
    #[case("BN-202403-00A1", None)]
    #[case("BN-202403-", None)]
    #[case("nodash", None)]
    fn parses_suffix(#[case] number: &str, #[case] expected: Option<u32>) {
        assert_eq!(parse_suffix(number), expected);
    }

    #[test]
    fn first_number_of_a_month_is_0001() {
        assert_eq!(
            next_in_sequence("BN-202403-", None).unwrap(),
            "BN-202403-0001"
        );
    }

    #[test]
    fn increments_previous_suffix() {
        assert_eq!(
            next_in_sequence("BN-202403-", Some("BN-202403-0001")).unwrap(),
            "BN-202403-0002"
        );
        assert_eq!(
            next_in_sequence("PO-202401-", Some("PO-202401-0999")).unwrap(),
            "PO-202401-1000"
        );
    }

    #[test]
    fn refuses_malformed_previous_number() {
        assert_matches!(
            next_in_sequence("BN-202403-", Some("BN-202403-XYZ1")),
            Err(ServiceError::InternalError(_))
        );
    }

    #[test]
    fn exhausted_sequence_is_a_conflict() {
        assert_matches!(
            next_in_sequence("BN-202403-", Some("BN-202403-9999")),
            Err(ServiceError::Conflict(_))
        );
    }
}
