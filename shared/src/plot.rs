use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Polygon;

pub const MAX_NAME_CHARS: usize = 64;
pub const MAX_DESCRIPTION_CHARS: usize = 1000;

pub type PlotId = u64;
pub type UserId = String;

/// A claimed polygon of land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plot {
    pub id: PlotId,
    pub owner_id: UserId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub polygon: Polygon,
    #[serde(default)]
    pub score: i64,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing views offered by the plot API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotView {
    #[default]
    Recent,
    Top,
    Mine,
}

impl PlotView {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recent => "recent",
            Self::Top => "top",
            Self::Mine => "mine",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "recent" => Some(Self::Recent),
            "top" => Some(Self::Top),
            "mine" => Some(Self::Mine),
            _ => None,
        }
    }
}

/// Body of `PATCH /api/plots/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotMetaUpdate {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Response of plot mutations made over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotMutationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot: Option<Plot>,
    pub new_balance: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotListResponse {
    pub plots: Vec<Plot>,
}

/// The signed-in user as reported by `GET /api/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub name: String,
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlotMetaError {
    #[error("plot name cannot be empty")]
    EmptyName,
    #[error("plot name is longer than {MAX_NAME_CHARS} characters")]
    NameTooLong,
    #[error("plot description is longer than {MAX_DESCRIPTION_CHARS} characters")]
    DescriptionTooLong,
}

/// Trim and length-check plot metadata, returning the normalised pair.
pub fn validate_plot_meta(
    name: &str,
    description: &str,
) -> Result<(String, String), PlotMetaError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PlotMetaError::EmptyName);
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(PlotMetaError::NameTooLong);
    }
    let description = description.trim();
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(PlotMetaError::DescriptionTooLong);
    }
    Ok((name.to_string(), description.to_string()))
}
