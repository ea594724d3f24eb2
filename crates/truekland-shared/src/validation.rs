//! Request payload schemas.
//!
//! Each `*Input` is the raw JSON body a client sends. `validate()` checks
//! every field, collects all failures into [`ValidationErrors`], and returns
//! a sanitized value that is safe to persist.

use serde::Deserialize;

use crate::constants::*;
use crate::error::ValidationErrors;
use crate::sanitize::{
    contains_script, is_valid_email, normalize_email, sanitize_line, sanitize_text, sanitize_url,
};
use crate::types::{Category, PostId};

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn check_len(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = char_len(value);
    if len < min {
        errors.push(field, format!("must be at least {min} characters"));
    } else if len > max {
        errors.push(field, format!("must be at most {max} characters"));
    }
}

fn check_script(errors: &mut ValidationErrors, field: &'static str, raw: &str) {
    if contains_script(raw) && !errors.has(field) {
        errors.push(field, "contains forbidden content");
    }
}

fn check_price(errors: &mut ValidationErrors, price: f64) {
    if !price.is_finite() || price < 0.0 {
        errors.push("price", "must be a non-negative number");
    } else if price > POST_PRICE_MAX {
        errors.push("price", format!("must be at most {POST_PRICE_MAX}"));
    }
}

fn check_images(errors: &mut ValidationErrors, images: &[String]) -> Vec<String> {
    if images.len() < POST_IMAGES_MIN {
        errors.push("images", format!("at least {POST_IMAGES_MIN} image is required"));
    } else if images.len() > POST_IMAGES_MAX {
        errors.push("images", format!("at most {POST_IMAGES_MAX} images are allowed"));
    }
    let mut clean = Vec::with_capacity(images.len());
    for raw in images {
        match sanitize_url(raw) {
            Some(url) => clean.push(url),
            None => {
                errors.push("images", format!("invalid image URL: {}", raw.trim()));
            }
        }
    }
    clean
}

fn parse_category(errors: &mut ValidationErrors, raw: &str) -> Option<Category> {
    match raw.trim().parse::<Category>() {
        Ok(c) => Some(c),
        Err(_) => {
            errors.push("category", "unknown category");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationInput {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

impl RegistrationInput {
    pub fn validate(self) -> Result<Registration, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let email = normalize_email(&self.email);
        if char_len(&email) > EMAIL_MAX || !is_valid_email(&email) {
            errors.push("email", "invalid email address");
        }

        check_len(&mut errors, "password", &self.password, PASSWORD_MIN, PASSWORD_MAX);

        let display_name = sanitize_line(&self.display_name);
        check_len(
            &mut errors,
            "displayName",
            &display_name,
            DISPLAY_NAME_MIN,
            DISPLAY_NAME_MAX,
        );
        check_script(&mut errors, "displayName", &self.display_name);

        errors.finish(Registration {
            email,
            password: self.password,
            display_name,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn validate(self) -> Result<Login, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = normalize_email(&self.email);
        if !is_valid_email(&email) {
            errors.push("email", "invalid email address");
        }
        if self.password.is_empty() {
            errors.push("password", "is required");
        }
        errors.finish(Login {
            email,
            password: self.password,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateInput {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub photo_url: Option<String>,
}

/// `Some(None)` clears an optional profile field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub display_name: Option<String>,
    pub bio: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub photo_url: Option<Option<String>>,
}

impl ProfileUpdateInput {
    pub fn validate(self) -> Result<ProfileChanges, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut changes = ProfileChanges::default();

        if let Some(raw) = self.display_name {
            let name = sanitize_line(&raw);
            check_len(&mut errors, "displayName", &name, DISPLAY_NAME_MIN, DISPLAY_NAME_MAX);
            check_script(&mut errors, "displayName", &raw);
            changes.display_name = Some(name);
        }

        if let Some(raw) = self.bio {
            let bio = sanitize_text(&raw);
            check_len(&mut errors, "bio", &bio, 0, BIO_MAX);
            check_script(&mut errors, "bio", &raw);
            changes.bio = Some((!bio.is_empty()).then_some(bio));
        }

        if let Some(raw) = self.location {
            let location = sanitize_line(&raw);
            check_len(&mut errors, "location", &location, 0, LOCATION_MAX);
            check_script(&mut errors, "location", &raw);
            changes.location = Some((!location.is_empty()).then_some(location));
        }

        if let Some(raw) = self.photo_url {
            if raw.trim().is_empty() {
                changes.photo_url = Some(None);
            } else {
                match sanitize_url(&raw) {
                    Some(url) => changes.photo_url = Some(Some(url)),
                    None => errors.push("photoUrl", "invalid URL"),
                }
            }
        }

        if changes == ProfileChanges::default() && errors.is_empty() {
            errors.push("body", "no fields to update");
        }

        errors.finish(changes)
    }
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostInput {
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    #[serde(default)]
    pub images: Vec<String>,
}

/// A listing that passed validation, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub price: f64,
    pub images: Vec<String>,
}

impl PostInput {
    pub fn validate(self) -> Result<PostDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = sanitize_line(&self.title);
        check_len(&mut errors, "title", &title, POST_TITLE_MIN, POST_TITLE_MAX);
        check_script(&mut errors, "title", &self.title);

        let description = sanitize_text(&self.description);
        check_len(
            &mut errors,
            "description",
            &description,
            POST_DESCRIPTION_MIN,
            POST_DESCRIPTION_MAX,
        );
        check_script(&mut errors, "description", &self.description);

        let category = parse_category(&mut errors, &self.category);
        check_price(&mut errors, self.price);
        let images = check_images(&mut errors, &self.images);

        match category {
            Some(category) if errors.is_empty() => Ok(PostDraft {
                title,
                description,
                category,
                price: self.price,
                images,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostUpdateInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub price: Option<f64>,
    pub images: Option<Vec<String>>,
}

impl PostChanges {
    pub fn is_empty(&self) -> bool {
        self == &PostChanges::default()
    }
}

impl PostUpdateInput {
    pub fn validate(self) -> Result<PostChanges, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut changes = PostChanges::default();

        if let Some(raw) = self.title {
            let title = sanitize_line(&raw);
            check_len(&mut errors, "title", &title, POST_TITLE_MIN, POST_TITLE_MAX);
            check_script(&mut errors, "title", &raw);
            changes.title = Some(title);
        }
        if let Some(raw) = self.description {
            let description = sanitize_text(&raw);
            check_len(
                &mut errors,
                "description",
                &description,
                POST_DESCRIPTION_MIN,
                POST_DESCRIPTION_MAX,
            );
            check_script(&mut errors, "description", &raw);
            changes.description = Some(description);
        }
        if let Some(raw) = self.category {
            changes.category = parse_category(&mut errors, &raw);
        }
        if let Some(price) = self.price {
            check_price(&mut errors, price);
            changes.price = Some(price);
        }
        if let Some(images) = self.images {
            changes.images = Some(check_images(&mut errors, &images));
        }

        if changes.is_empty() && errors.is_empty() {
            errors.push("body", "no fields to update");
        }

        errors.finish(changes)
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInput {
    pub text: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    Image(String),
}

impl MessageBody {
    /// Short form cached on the chat as its last message.
    pub fn preview(&self) -> String {
        match self {
            MessageBody::Text(text) => text.chars().take(100).collect(),
            MessageBody::Image(_) => "[image]".to_string(),
        }
    }
}

impl MessageInput {
    pub fn validate(self) -> Result<MessageBody, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let text = self.text.filter(|t| !t.trim().is_empty());
        let image = self.image_url.filter(|u| !u.trim().is_empty());

        match (text, image) {
            (Some(raw), None) => {
                let text = sanitize_text(&raw);
                check_len(&mut errors, "text", &text, 1, MESSAGE_MAX);
                check_script(&mut errors, "text", &raw);
                errors.finish(MessageBody::Text(text))
            }
            (None, Some(raw)) => match sanitize_url(&raw) {
                Some(url) => Ok(MessageBody::Image(url)),
                None => {
                    errors.push("imageUrl", "invalid URL");
                    Err(errors)
                }
            },
            (Some(_), Some(_)) => {
                errors.push("body", "send either text or an image, not both");
                Err(errors)
            }
            (None, None) => {
                errors.push("body", "message is empty");
                Err(errors)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Exchanges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeProposalInput {
    pub offered_post_id: PostId,
    pub requested_post_id: PostId,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeProposal {
    pub offered_post_id: PostId,
    pub requested_post_id: PostId,
    pub message: Option<String>,
}

impl ExchangeProposalInput {
    pub fn validate(self) -> Result<ExchangeProposal, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.offered_post_id == self.requested_post_id {
            errors.push("requestedPostId", "cannot exchange a post for itself");
        }

        let message = match self.message {
            Some(raw) => {
                let text = sanitize_text(&raw);
                check_len(&mut errors, "message", &text, 0, EXCHANGE_MESSAGE_MAX);
                check_script(&mut errors, "message", &raw);
                (!text.is_empty()).then_some(text)
            }
            None => None,
        };

        errors.finish(ExchangeProposal {
            offered_post_id: self.offered_post_id,
            requested_post_id: self.requested_post_id,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_input() -> PostInput {
        PostInput {
            title: "Mountain bike".into(),
            description: "Aluminium frame, 21 gears, new tyres.".into(),
            category: "sports".into(),
            price: 150.0,
            images: vec!["https://img.example.com/bike.jpg".into()],
        }
    }

    #[test]
    fn registration_normalizes_email_and_name() {
        let reg = RegistrationInput {
            email: " Ana@Example.COM ".into(),
            password: "secret1".into(),
            display_name: "  Ana   <b>P</b> ".into(),
        }
        .validate()
        .unwrap();
        assert_eq!(reg.email, "ana@example.com");
        assert_eq!(reg.display_name, "Ana P");
    }

    #[test]
    fn registration_collects_every_error() {
        let errors = RegistrationInput {
            email: "nope".into(),
            password: "123".into(),
            display_name: "A".into(),
        }
        .validate()
        .unwrap_err();
        assert!(errors.has("email"));
        assert!(errors.has("password"));
        assert!(errors.has("displayName"));
    }

    #[test]
    fn valid_post_is_sanitized() {
        let mut input = post_input();
        input.title = "  <i>Mountain</i>   bike ".into();
        let draft = input.validate().unwrap();
        assert_eq!(draft.title, "Mountain bike");
        assert_eq!(draft.category, Category::Sports);
    }

    #[test]
    fn post_rejects_bad_fields() {
        let mut input = post_input();
        input.title = "ab".into();
        input.category = "furniture".into();
        input.price = -1.0;
        input.images = vec!["javascript:alert(1)".into()];
        let errors = input.validate().unwrap_err();
        assert!(errors.has("title"));
        assert!(errors.has("category"));
        assert!(errors.has("price"));
        assert!(errors.has("images"));
    }

    #[test]
    fn post_requires_an_image() {
        let mut input = post_input();
        input.images.clear();
        assert!(input.validate().unwrap_err().has("images"));
    }

    #[test]
    fn post_rejects_nan_price_and_scripts() {
        let mut input = post_input();
        input.price = f64::NAN;
        input.description = "Nice lamp <img src=x onerror=alert(1)> works".into();
        let errors = input.validate().unwrap_err();
        assert!(errors.has("price"));
        assert!(errors.has("description"));
    }

    #[test]
    fn empty_post_update_is_rejected() {
        let errors = PostUpdateInput::default().validate().unwrap_err();
        assert!(errors.has("body"));
    }

    #[test]
    fn profile_update_clears_optional_fields() {
        let changes = ProfileUpdateInput {
            bio: Some("   ".into()),
            photo_url: Some(String::new()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(changes.bio, Some(None));
        assert_eq!(changes.photo_url, Some(None));
        assert_eq!(changes.display_name, None);
    }

    #[test]
    fn message_requires_exactly_one_body() {
        assert!(MessageInput::default().validate().is_err());
        assert!(MessageInput {
            text: Some("hi".into()),
            image_url: Some("https://x.io/a.png".into()),
        }
        .validate()
        .is_err());
        assert_eq!(
            MessageInput {
                text: Some(" hola ".into()),
                image_url: None,
            }
            .validate()
            .unwrap(),
            MessageBody::Text("hola".into())
        );
    }

    #[test]
    fn lone_angle_brackets_survive_sanitizing() {
        let mut input = post_input();
        input.description = "Works fine, worth < 100 euros, includes charger and case".into();
        assert_eq!(
            input.validate().unwrap().description,
            "Works fine, worth < 100 euros, includes charger and case"
        );
        assert_eq!(
            MessageInput {
                text: Some("I can do <3 days, ok?".into()),
                image_url: None,
            }
            .validate()
            .unwrap(),
            MessageBody::Text("I can do <3 days, ok?".into())
        );
    }

    #[test]
    fn message_text_is_bounded() {
        let long = "x".repeat(MESSAGE_MAX + 1);
        let errors = MessageInput {
            text: Some(long),
            image_url: None,
        }
        .validate()
        .unwrap_err();
        assert!(errors.has("text"));
    }

    #[test]
    fn exchange_with_same_post_rejected() {
        let id = PostId::new();
        let errors = ExchangeProposalInput {
            offered_post_id: id,
            requested_post_id: id,
            message: None,
        }
        .validate()
        .unwrap_err();
        assert!(errors.has("requestedPostId"));
    }
}
