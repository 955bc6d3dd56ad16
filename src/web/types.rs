use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportFileQuery {
    pub file: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DatasetDto {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub location: String,
    pub format: String,
}

impl From<crate::db::Dataset> for DatasetDto {
    fn from(model: crate::db::Dataset) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            location: model.location,
            format: model.format,
        }
    }
}
