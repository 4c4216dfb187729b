//! Vista3D segmentation service data contract
//!
//! The inference service is reached over HTTP by the caller. This module
//! only models its JSON request body and decodes the ZIP archive it
//! returns into a [`LabeledVolume`].

use crate::error::{Error, Result};
use crate::nifti;
use crate::registry::LabelRegistry;
use crate::volume::LabeledVolume;
use serde::{Deserialize, Serialize};

/// Structures the model should segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompts {
    /// Structure names as known to the model
    pub labels: Vec<String>,
}

/// Body of `POST <inference_url>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// URL of the source image the service downloads
    pub image: String,
    /// Label prompts
    pub prompts: Prompts,
}

impl InferenceRequest {
    /// Request segmentation of `labels` in the image at `image_url`
    pub fn new<I, S>(image_url: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            image: image_url.into(),
            prompts: Prompts {
                labels: labels.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// Request every structure of a registry, by name
    pub fn for_registry(image_url: impl Into<String>, registry: &LabelRegistry) -> Self {
        Self::new(image_url, registry.iter().map(|l| l.name.clone()))
    }

    /// Serialize to the JSON body
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode the service response into a labeled volume
///
/// # Errors
/// [`Error::Load`] when the body is not a ZIP archive holding a NIfTI file.
pub fn load_inference_result(bytes: &[u8]) -> Result<LabeledVolume> {
    if !bytes.starts_with(b"PK") {
        return Err(Error::load("Inference response is not a ZIP archive"));
    }
    nifti::load_from_bytes(bytes)
}
