use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::crypto::sha256_hex;
use crate::error::{Result, ServerError};
use crate::form::FormErrors;
use crate::image::{Image, MAX_DESCRIPTION_LENGTH};
use crate::router::HOME_PATH;
use crate::user::User;

/// What a failed upload renders back.
#[derive(Debug, Serialize, Deserialize)]
pub struct View {
    pub errors: FormErrors,
}

fn validate_description(description: &str) -> std::result::Result<(), String> {
    if description.trim().is_empty() {
        return Err("Each image needs a file name to describe it.".to_owned());
    }
    if description.len() > MAX_DESCRIPTION_LENGTH {
        return Err(format!(
            "Image descriptions are limited to {MAX_DESCRIPTION_LENGTH} characters."
        ));
    }
    Ok(())
}

/// Handler to upload images, gated by the moderation service.
///
/// Parts are processed in order; the first rejection aborts the batch
/// with the upstream status, leaving earlier accepted images persisted.
pub async fn handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    mut errors: FormErrors,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut accepted = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ServerError::ParsingForm(Box::new(err)))?
    {
        let description = field
            .file_name()
            .or(field.name())
            .unwrap_or_default()
            .to_owned();
        let data = field
            .bytes()
            .await
            .map_err(|err| ServerError::ParsingForm(Box::new(err)))?;

        if let Err(message) = validate_description(&description) {
            errors.add("images", message);
            tracing::warn!("upload input contains errors, returning view");
            return Ok(Json(View { errors }).into_response());
        }

        tracing::info!(
            email = %user.email,
            "sending uploaded image to moderation check"
        );
        state.moderation.check(user.id, data.to_vec()).await?;

        let image = Image::owned(
            user.id,
            format!("/media/{}", sha256_hex(&data)),
            description,
        );
        state.images.insert(&image).await?;
        accepted += 1;
    }

    tracing::info!(
        email = %user.email,
        count = accepted,
        "successfully uploaded all images, redirecting to gallery home"
    );
    Ok(Redirect::to(HOME_PATH).into_response())
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;

    #[test]
    fn test_validate_description() {
        assert!(validate_description("cat.webp").is_ok());
        assert!(validate_description("").is_err());
        assert!(validate_description("   ").is_err());
        assert!(validate_description(&"d".repeat(MAX_DESCRIPTION_LENGTH)).is_ok());
        assert!(validate_description(&"d".repeat(MAX_DESCRIPTION_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_media_url_fits_column_limit() {
        let url = format!("/media/{}", sha256_hex(b"image bytes"));
        assert!(url.len() <= crate::image::MAX_URL_LENGTH);
    }
}
