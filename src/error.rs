// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

use crate::models::ApartmentId;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),
    #[error("Not allowed: {0}")]
    Unauthorized(String),
    #[error("Apartment {0} is not addressed by this record")]
    NotAddressed(ApartmentId),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidInput(msg.into())
    }

    pub fn inconsistent(msg: impl Into<String>) -> Self {
        EngineError::InconsistentState(msg.into())
    }
}
