use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    auth::dto::{LoginRequest, NgoRegistrationRequest, SignupRequest},
    error::{AuthError, AuthResult, FieldIssue},
};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_NAME_LEN: usize = 2;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validated registration input with a normalized email and trimmed name.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

fn check_email(email: &str, issues: &mut Vec<FieldIssue>) {
    if !is_valid_email(email) {
        issues.push(FieldIssue::new("email", "Invalid email address"));
    }
}

fn check_password(password: &str, issues: &mut Vec<FieldIssue>) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        issues.push(FieldIssue::new(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
}

fn check_name(field: &str, label: &str, name: &str, issues: &mut Vec<FieldIssue>) {
    if name.chars().count() < MIN_NAME_LEN {
        issues.push(FieldIssue::new(
            field,
            format!("{label} must be at least {MIN_NAME_LEN} characters"),
        ));
    }
}

fn registration(
    message: &'static str,
    email: &str,
    password: &str,
    (field, label, name): (&str, &str, &str),
) -> AuthResult<Registration> {
    let email = normalize_email(email);
    let name = name.trim();
    let mut issues = Vec::new();
    check_email(&email, &mut issues);
    check_password(password, &mut issues);
    check_name(field, label, name, &mut issues);
    if !issues.is_empty() {
        return Err(AuthError::validation(message, issues));
    }
    Ok(Registration {
        email,
        password: password.to_owned(),
        full_name: name.to_owned(),
    })
}

pub fn validate_signup(req: &SignupRequest) -> AuthResult<Registration> {
    registration(
        "Invalid signup data",
        &req.email,
        &req.password,
        ("fullName", "Name", &req.full_name),
    )
}

pub fn validate_ngo(req: &NgoRegistrationRequest) -> AuthResult<Registration> {
    registration(
        "Invalid NGO data",
        &req.email,
        &req.password,
        ("organizationName", "Organization name", &req.organization_name),
    )
}

pub fn validate_login(req: &LoginRequest) -> AuthResult<Credentials> {
    let email = normalize_email(&req.email);
    let mut issues = Vec::new();
    check_email(&email, &mut issues);
    check_password(&req.password, &mut issues);
    if !issues.is_empty() {
        return Err(AuthError::validation("Invalid login data", issues));
    }
    Ok(Credentials {
        email,
        password: req.password.clone(),
    })
}
