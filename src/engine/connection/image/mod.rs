//! Image references and pulling images into the engine's local store.
//!
//! Pulls are anonymous: no registry credentials are sent. The engine's
//! progress stream is drained to completion before the pull is reported as
//! finished.

use std::fmt;
use std::pin::Pin;

use bollard::Docker;
use bollard::errors::Error as BollardError;
use bollard::models::CreateImageInfo;
use bollard::query_parameters::{CreateImageOptions, CreateImageOptionsBuilder};
use futures_util::{Stream, StreamExt};
use tracing::{debug, info};

use super::EngineConnector;
use crate::error::{ConfigError, ImageError, WorkcellError};

const DEFAULT_TAG: &str = "latest";

/// Boxed progress stream returned by [`ImagePuller::create_image`].
pub type CreateImageStream<'a> =
    Pin<Box<dyn Stream<Item = Result<CreateImageInfo, BollardError>> + Send + 'a>>;

/// Behaviour required to pull images through a backing engine client.
///
/// This abstraction keeps pull handling testable without a live daemon.
pub trait ImagePuller {
    /// Start pulling an image, returning the engine's progress stream.
    fn create_image(&self, options: CreateImageOptions) -> CreateImageStream<'_>;
}

impl ImagePuller for Docker {
    fn create_image(&self, options: CreateImageOptions) -> CreateImageStream<'_> {
        Box::pin(Self::create_image(self, Some(options), None, None))
    }
}

/// A repository plus tag, parsed from a `repository[:tag]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    repository: String,
    tag: String,
}

impl ImageReference {
    /// Parse an image reference.
    ///
    /// The reference is split on the first `:`. Without a separator the tag
    /// defaults to `latest`; with several separators everything after the
    /// first is kept literally as the tag. Registry hosts with ports are not
    /// special-cased. The reference is used as given; surrounding whitespace
    /// is not stripped.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when the repository part is
    /// empty or blank.
    pub fn parse(reference: &str) -> Result<Self, WorkcellError> {
        let (repository, tag) = reference
            .split_once(':')
            .map_or((reference, DEFAULT_TAG), |(repo, suffix)| {
                (repo, if suffix.is_empty() { DEFAULT_TAG } else { suffix })
            });

        if repository.trim().is_empty() {
            return Err(WorkcellError::from(ConfigError::MissingRequired {
                field: String::from("image"),
            }));
        }

        Ok(Self {
            repository: String::from(repository),
            tag: String::from(tag),
        })
    }

    /// Return the repository part.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Return the tag part.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

impl EngineConnector {
    /// Pull an image and wait until the engine reports completion (async
    /// version).
    ///
    /// # Errors
    ///
    /// Returns `ImageError::PullFailed` when the engine reports an error on
    /// the progress stream or the stream itself fails.
    pub async fn pull_image_async<C: ImagePuller>(
        client: &C,
        image: &ImageReference,
    ) -> Result<(), WorkcellError> {
        let options = CreateImageOptionsBuilder::new()
            .from_image(image.repository())
            .tag(image.tag())
            .build();

        info!(image = %image, "pulling image");
        let mut progress = client.create_image(options);
        while let Some(event) = progress.next().await {
            let info = event.map_err(|error| pull_failed(image, error.to_string()))?;
            if let Some(message) = info.error_detail.and_then(|detail| detail.message) {
                return Err(pull_failed(image, message));
            }
            if let Some(status) = info.status {
                debug!(
                    image = %image,
                    status = %status,
                    progress = info.progress.as_deref(),
                    "pull progress"
                );
            }
        }
        info!(image = %image, "image pulled");
        Ok(())
    }

    /// Pull an image using a caller runtime handle.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::pull_image_async`].
    pub fn pull_image<C: ImagePuller>(
        runtime: &tokio::runtime::Handle,
        client: &C,
        image: &ImageReference,
    ) -> Result<(), WorkcellError> {
        runtime.block_on(Self::pull_image_async(client, image))
    }
}

fn pull_failed(image: &ImageReference, message: String) -> WorkcellError {
    WorkcellError::from(ImageError::PullFailed {
        image: image.to_string(),
        message,
    })
}
