//! Validation and normalisation of submitted post and comment forms.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::domain::entities::GroupRecord;

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const INVALID_CHOICE_MESSAGE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE_MESSAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const EMPTY_FILE_MESSAGE: &str = "The submitted file is empty.";
pub const CONTRADICTION_MESSAGE: &str =
    "Please either submit a file or check the clear checkbox, not both.";

/// Field name to error messages, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
}

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, name: &str) -> bool {
        !self.field(name).is_empty()
    }
}

impl std::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Raw post form input.
#[derive(Debug, Clone, Default)]
pub struct PostSubmission {
    pub text: String,
    pub group: String,
    pub image: Option<ImageUpload>,
    pub clear_image: bool,
}

#[derive(Debug, Clone)]
pub struct ValidImage {
    pub file_name: String,
    pub bytes: Bytes,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone)]
pub enum ImageChange {
    Keep,
    Clear,
    Replace(ValidImage),
}

#[derive(Debug, Clone)]
pub struct CleanPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: ImageChange,
}

impl PostSubmission {
    /// Validate the submission against the selectable groups.
    pub fn clean(&self, groups: &[GroupRecord]) -> Result<CleanPost, FormErrors> {
        let mut errors = FormErrors::default();

        let text = self.text.trim();
        if text.is_empty() {
            errors.add("text", REQUIRED_MESSAGE);
        }

        let group_id = match clean_group(&self.group, groups) {
            Ok(group_id) => group_id,
            Err(message) => {
                errors.add("group", message);
                None
            }
        };

        let image = match self.image.as_ref().filter(|upload| !is_blank_upload(upload)) {
            Some(_) if self.clear_image => {
                errors.add("image", CONTRADICTION_MESSAGE);
                ImageChange::Keep
            }
            Some(upload) => match clean_image(upload) {
                Ok(image) => ImageChange::Replace(image),
                Err(message) => {
                    errors.add("image", message);
                    ImageChange::Keep
                }
            },
            None if self.clear_image => ImageChange::Clear,
            None => ImageChange::Keep,
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(CleanPost {
            text: text.to_string(),
            group_id,
            image,
        })
    }
}

/// Raw comment form input.
#[derive(Debug, Clone, Default)]
pub struct CommentSubmission {
    pub text: String,
}

impl CommentSubmission {
    pub fn clean(&self) -> Result<String, FormErrors> {
        let text = self.text.trim();
        if text.is_empty() {
            let mut errors = FormErrors::default();
            errors.add("text", REQUIRED_MESSAGE);
            return Err(errors);
        }
        Ok(text.to_string())
    }
}

fn clean_group(raw: &str, groups: &[GroupRecord]) -> Result<Option<i64>, &'static str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    raw.parse::<i64>()
        .ok()
        .filter(|id| groups.iter().any(|group| group.id == *id))
        .map(Some)
        .ok_or(INVALID_CHOICE_MESSAGE)
}

/// A file input left empty still submits a nameless, empty part.
fn is_blank_upload(upload: &ImageUpload) -> bool {
    upload.file_name.trim().is_empty() && upload.bytes.is_empty()
}

fn clean_image(upload: &ImageUpload) -> Result<ValidImage, &'static str> {
    if upload.bytes.is_empty() {
        return Err(EMPTY_FILE_MESSAGE);
    }

    let Ok(size) = imagesize::blob_size(&upload.bytes) else {
        return Err(INVALID_IMAGE_MESSAGE);
    };

    if size.width == 0 || size.height == 0 {
        return Err(INVALID_IMAGE_MESSAGE);
    }

    Ok(ValidImage {
        file_name: upload.file_name.clone(),
        bytes: upload.bytes.clone(),
        width: size.width,
        height: size.height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
        0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
    ];

    fn groups() -> Vec<GroupRecord> {
        vec![GroupRecord {
            id: 7,
            title: "Cats".to_string(),
            description: "About cats".to_string(),
            slug: "cats".to_string(),
        }]
    }

    fn submission(text: &str, group: &str) -> PostSubmission {
        PostSubmission {
            text: text.to_string(),
            group: group.to_string(),
            ..PostSubmission::default()
        }
    }

    #[test]
    fn text_is_trimmed_and_required() {
        let errors = submission("   \n", "").clean(&groups()).expect_err("blank text");
        assert_eq!(errors.field("text"), [REQUIRED_MESSAGE.to_string()]);

        let clean = submission("  Hello  ", "").clean(&groups()).expect("valid");
        assert_eq!(clean.text, "Hello");
        assert_eq!(clean.group_id, None);
    }

    #[test]
    fn group_must_be_an_available_choice() {
        let clean = submission("Hello", "7").clean(&groups()).expect("valid");
        assert_eq!(clean.group_id, Some(7));

        for raw in ["8", "cats", "1.5"] {
            let errors = submission("Hello", raw).clean(&groups()).expect_err("invalid");
            assert_eq!(errors.field("group"), [INVALID_CHOICE_MESSAGE.to_string()]);
            assert!(!errors.has("text"));
        }
    }

    #[test]
    fn image_is_probed_for_dimensions() {
        let mut form = submission("Hello", "");
        form.image = Some(ImageUpload {
            file_name: "small.gif".to_string(),
            bytes: Bytes::from_static(SMALL_GIF),
        });
        let clean = form.clean(&groups()).expect("valid");
        match clean.image {
            ImageChange::Replace(image) => {
                assert_eq!((image.width, image.height), (2, 1));
                assert_eq!(image.file_name, "small.gif");
            }
            other => panic!("unexpected image change: {other:?}"),
        }
    }

    #[test]
    fn non_image_upload_is_rejected() {
        let mut form = submission("Hello", "");
        form.image = Some(ImageUpload {
            file_name: "notes.txt".to_string(),
            bytes: Bytes::from_static(b"definitely not pixels"),
        });
        let errors = form.clean(&groups()).expect_err("invalid image");
        assert_eq!(errors.field("image"), [INVALID_IMAGE_MESSAGE.to_string()]);
    }

    #[test]
    fn blank_file_input_keeps_current_image() {
        let mut form = submission("Hello", "");
        form.image = Some(ImageUpload {
            file_name: String::new(),
            bytes: Bytes::new(),
        });
        let clean = form.clean(&groups()).expect("valid");
        assert!(matches!(clean.image, ImageChange::Keep));
    }

    #[test]
    fn clear_checkbox_conflicts_with_new_upload() {
        let mut form = submission("Hello", "");
        form.clear_image = true;
        assert!(matches!(
            form.clean(&groups()).expect("valid").image,
            ImageChange::Clear
        ));

        form.image = Some(ImageUpload {
            file_name: "small.gif".to_string(),
            bytes: Bytes::from_static(SMALL_GIF),
        });
        let errors = form.clean(&groups()).expect_err("contradiction");
        assert_eq!(errors.field("image"), [CONTRADICTION_MESSAGE.to_string()]);
    }

    #[test]
    fn comment_text_is_required() {
        let blank = CommentSubmission {
            text: " ".to_string(),
        };
        assert!(blank.clean().expect_err("blank").has("text"));

        let comment = CommentSubmission {
            text: " Nice post ".to_string(),
        };
        assert_eq!(comment.clean().expect("valid"), "Nice post");
    }

    #[test]
    fn errors_display_field_and_message() {
        let mut errors = FormErrors::default();
        errors.add("text", REQUIRED_MESSAGE);
        assert_eq!(errors.to_string(), format!("text: {REQUIRED_MESSAGE}"));
    }
}
