//! Create/edit forms and their validation

use serde::{Deserialize, Serialize};

use crate::error::OperationError;
use crate::model::{StorageMount, Tag};

pub const MAX_NAME_LEN: usize = 64;
pub const MAX_DESCRIPTION_LEN: usize = 512;
pub const MAX_AUTO_STOP_HOURS: u32 = 24;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub spec: String,
    pub image: String,
    #[serde(default)]
    pub ssh_enabled: bool,
    #[serde(default)]
    pub auto_stop_hours: Option<u32>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub storage: Vec<StorageMount>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl CreateRequest {
    pub fn new(name: impl Into<String>, spec: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec: spec.into(),
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), OperationError> {
        validate_name(&self.name)?;
        validate_description(&self.description)?;
        required("spec", &self.spec)?;
        required("image", &self.image)?;
        validate_auto_stop(self.auto_stop_hours)?;
        for (i, tag) in self.tags.iter().enumerate() {
            required("tag key", &tag.key)?;
            if self.tags[..i].iter().any(|t| t.key == tag.key) {
                return Err(OperationError::validation(
                    "tags",
                    format!("duplicate key '{}'", tag.key),
                ));
            }
        }
        Ok(())
    }
}

/// Fields editable while an instance is stopped. `None` leaves a field as is.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRequest {
    pub name: Option<String>,
    pub spec: Option<String>,
    pub image: Option<String>,
    pub ssh_enabled: Option<bool>,
    /// `Some(None)` turns auto-stop off
    pub auto_stop_hours: Option<Option<u32>>,
}

impl EditRequest {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self) -> Result<(), OperationError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(spec) = &self.spec {
            required("spec", spec)?;
        }
        if let Some(image) = &self.image {
            required("image", image)?;
        }
        if let Some(hours) = self.auto_stop_hours {
            validate_auto_stop(hours)?;
        }
        Ok(())
    }
}

fn required(field: &'static str, value: &str) -> Result<(), OperationError> {
    if value.trim().is_empty() {
        return Err(OperationError::validation(field, "is required"));
    }
    Ok(())
}

/// Required, at most [`MAX_NAME_LEN`] characters of letters, digits, '-' or
/// '_'. Names are printed unquoted in toasts and the CLI table.
pub fn validate_name(name: &str) -> Result<(), OperationError> {
    required("name", name)?;
    if name.chars().count() > MAX_NAME_LEN {
        return Err(OperationError::validation(
            "name",
            format!("must be at most {} characters", MAX_NAME_LEN),
        ));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(OperationError::validation(
            "name",
            format!("'{}' is not allowed; use letters, digits, '-' or '_'", bad),
        ));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), OperationError> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(OperationError::validation(
            "description",
            format!("must be at most {} characters", MAX_DESCRIPTION_LEN),
        ));
    }
    Ok(())
}

fn validate_auto_stop(hours: Option<u32>) -> Result<(), OperationError> {
    match hours {
        Some(h) if h == 0 || h > MAX_AUTO_STOP_HOURS => Err(OperationError::validation(
            "auto_stop_hours",
            format!("must be between 1 and {}", MAX_AUTO_STOP_HOURS),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_requires_fields() {
        let ok = CreateRequest::new("resnet-train", "GPU: 1*V100", "pytorch-2.1");
        assert!(ok.validate().is_ok());

        let err = CreateRequest::new("", "GPU", "img").validate().unwrap_err();
        assert_eq!(err, OperationError::validation("name", "is required"));

        let err = CreateRequest::new("a", " ", "img").validate().unwrap_err();
        assert!(matches!(err, OperationError::Validation { field: "spec", .. }));
    }

    #[test]
    fn test_name_charset_and_length() {
        assert!(validate_name("train_v2-final").is_ok());
        assert!(validate_name("has space").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());

        // Renames follow the same rule
        let rename = EditRequest {
            name: Some("bad name!".into()),
            ..Default::default()
        };
        let err = rename.validate().unwrap_err();
        assert!(matches!(err, OperationError::Validation { field: "name", .. }));
        assert!(err.to_string().contains("' ' is not allowed"));
    }

    #[test]
    fn test_auto_stop_bounds() {
        let mut req = CreateRequest::new("a", "s", "i");
        req.auto_stop_hours = Some(0);
        assert!(req.validate().is_err());
        req.auto_stop_hours = Some(24);
        assert!(req.validate().is_ok());

        let edit = EditRequest {
            auto_stop_hours: Some(Some(25)),
            ..Default::default()
        };
        assert!(edit.validate().is_err());
    }

    #[test]
    fn test_duplicate_tag_keys_rejected() {
        let mut req = CreateRequest::new("a", "s", "i");
        req.tags = vec![Tag::new("team", "cv"), Tag::new("team", "nlp")];
        assert!(matches!(
            req.validate(),
            Err(OperationError::Validation { field: "tags", .. })
        ));
    }
}
