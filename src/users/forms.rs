use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::images::{picture_extension, PictureUpload};

pub const REQUIRED: &str = "This field is required.";
pub const USERNAME_TAKEN: &str = "That username is taken. Please choose a different one.";
pub const EMAIL_TAKEN: &str = "That email is taken. Please choose a different one.";

/// Width of the `users.email` column.
pub const EMAIL_MAX_CHARS: usize = 120;

/// Field name -> messages. Empty when the form is valid.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn check_username(errors: &mut FieldErrors, username: &str) {
    let len = username.chars().count();
    if username.trim().is_empty() {
        errors.add("username", REQUIRED);
    } else if !(2..=20).contains(&len) {
        errors.add("username", "Field must be between 2 and 20 characters long.");
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if email.trim().is_empty() {
        errors.add("email", REQUIRED);
    } else if email.chars().count() > EMAIL_MAX_CHARS {
        errors.add(
            "email",
            format!("Field must be between 1 and {EMAIL_MAX_CHARS} characters long."),
        );
    } else if !is_valid_email(email) {
        errors.add("email", "Invalid email address.");
    }
}

fn check_new_password(errors: &mut FieldErrors, password: &str, confirm: &str) {
    if password.is_empty() {
        errors.add("password", REQUIRED);
    }
    if confirm.is_empty() {
        errors.add("confirm_password", REQUIRED);
    } else if confirm != password {
        errors.add("confirm_password", "Field must be equal to password.");
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    pub fn normalize(&mut self) {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_string();
    }

    /// Checks that need no database.
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        check_username(&mut errors, &self.username);
        check_email(&mut errors, &self.email);
        check_new_password(&mut errors, &self.password, &self.confirm_password);
        errors
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    /// Checkbox; present (any value) means checked.
    pub remember: Option<String>,
}

impl LoginForm {
    pub fn remember(&self) -> bool {
        matches!(
            self.remember.as_deref(),
            Some(v) if !v.is_empty() && v != "false" && v != "0"
        )
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        check_email(&mut errors, self.email.trim());
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RequestResetForm {
    pub email: String,
}

impl RequestResetForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        check_email(&mut errors, self.email.trim());
        errors
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetPasswordForm {
    pub password: String,
    pub confirm_password: String,
}

impl ResetPasswordForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        check_new_password(&mut errors, &self.password, &self.confirm_password);
        errors
    }
}

/// Account update, assembled from a multipart body.
#[derive(Debug, Default)]
pub struct AccountForm {
    pub username: String,
    pub email: String,
    pub picture: Option<PictureUpload>,
}

impl AccountForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        check_username(&mut errors, &self.username);
        check_email(&mut errors, &self.email);
        if let Some(p) = &self.picture {
            if picture_extension(&p.file_name).is_none() {
                errors.add("picture", "File does not have an approved extension: jpg, png");
            }
        }
        errors
    }
}
