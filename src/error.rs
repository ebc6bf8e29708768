// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for Relabel

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Relabel operations
pub type Result<T> = std::result::Result<T, RelabelError>;

/// Relabel error types
#[derive(Error, Debug)]
pub enum RelabelError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tag cannot be empty")]
    EmptyTag,

    #[error("Tags may only contain letters, numbers, underscores, or hyphens")]
    InvalidTagCharacters,

    #[error("Tag already exists: {0}")]
    DuplicateTag(String),

    #[error("Tag not found: {0}")]
    TagNotFound(String),

    #[error("Source file does not exist: {0:?}")]
    MissingSource(PathBuf),

    #[error("Source path is not a file: {0:?}")]
    NotAFile(PathBuf),

    #[error("File format not supported: {0}")]
    UnsupportedExtension(String),

    #[error("Destination path is not a directory: {0:?}")]
    NotADirectory(PathBuf),

    #[error("Could not find unique filename after 9999 attempts in {0:?}")]
    CounterExhausted(PathBuf),

    #[error("Thumbnail generation failed: {0}")]
    Thumbnail(String),
}
