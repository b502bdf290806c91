// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! Error types shared by the store, alert and weather adapters

use thiserror::Error;

/// Errors returned by a [`SensorStore`](crate::db::SensorStore)
///
/// An empty result is never an error: `fetch_latest` returns `Ok(vec![])` when
/// the store is reachable but has no rows, so callers can tell "no data" from
/// an outage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store unreachable, busy past its timeout, or could not be opened
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Store reachable but the statement failed
    #[error("store query failed: {0}")]
    Query(String),

    /// A stored row could not be decoded
    #[error("stored row could not be decoded: {0}")]
    Serialization(String),
}

impl StoreError {
    /// True when the store could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::SqliteFailure(e, _) => match e.code {
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::SystemIoFailure => StoreError::Unavailable(err.to_string()),
                _ => StoreError::Query(err.to_string()),
            },
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..) => StoreError::Serialization(err.to_string()),
            _ => StoreError::Query(err.to_string()),
        }
    }
}

/// Errors returned by an [`AlertDispatcher`](crate::alerts::AlertDispatcher)
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The channel could not be reached
    #[error("alert transport failed: {0}")]
    Transport(String),

    /// The channel answered but refused the alert
    #[error("alert rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Alerting is switched off in the configuration
    #[error("alerting disabled")]
    Disabled,
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        DispatchError::Transport(err.to_string())
    }
}

/// Errors returned by a [`WeatherSource`](crate::weather::WeatherSource)
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather request failed: {0}")]
    Request(String),

    #[error("weather service returned status {0}")]
    Status(u16),

    #[error("weather response could not be decoded: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            WeatherError::Decode(err.to_string())
        } else {
            WeatherError::Request(err.to_string())
        }
    }
}
