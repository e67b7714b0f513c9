use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        password::{hash_password, verify_password},
        safe_next,
        session::SESSION_COOKIE,
        Anonymous, CurrentUser,
    },
    cookies,
    error::AppError,
    flash::{Category, Flashes},
    images::{discard_picture, save_picture, PictureUpload},
    posts::services::author_page,
    state::AppState,
    users::{
        forms::{
            AccountForm, FieldErrors, LoginForm, RegisterForm, RequestResetForm,
            ResetPasswordForm, EMAIL_TAKEN, USERNAME_TAKEN,
        },
        repo::Duplicate,
        repo_types::{NewUser, ProfileUpdate, User},
    },
    views::{page, render},
};

pub const REGISTERED: &str = "Your account has been created! You are now able to log in";
pub const LOGIN_FAILED: &str = "Login unsuccessful. Please check email and password.";
pub const ACCOUNT_UPDATED: &str = "Your account has been updated!";
pub const RESET_SENT: &str = "An email has been sent with instructions to reset your password.";
pub const INVALID_TOKEN: &str = "That is an invalid or expired token";
pub const PASSWORD_UPDATED: &str = "Your password has been updated! You are now able to log in";

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_page).post(register))
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
        .route("/account", get(account_page).post(update_account))
        .route("/user/:username", get(user_posts))
        .route(
            "/reset_password",
            get(reset_request_page).post(reset_request),
        )
        .route(
            "/reset_password/:token",
            get(reset_token_page).post(reset_password),
        )
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Field error for a unique value another account took after the lookup.
fn duplicate_error(err: &anyhow::Error) -> Option<FieldErrors> {
    let dup = err.downcast_ref::<Duplicate>()?;
    let message = match dup.field {
        "email" => EMAIL_TAKEN,
        _ => USERNAME_TAKEN,
    };
    let mut errors = FieldErrors::default();
    errors.add(dup.field, message);
    Some(errors)
}

fn form_status(errors: &FieldErrors) -> StatusCode {
    if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}

// --- register ---

fn register_view(flashes: Flashes, username: &str, email: &str, errors: FieldErrors) -> Response {
    render(
        form_status(&errors),
        "register",
        "Register",
        flashes,
        json!({ "form": { "username": username, "email": email }, "errors": errors }),
    )
}

pub async fn register_page(_: Anonymous, flashes: Flashes) -> Response {
    register_view(flashes, "", "", FieldErrors::default())
}

#[instrument(skip_all)]
pub async fn register(
    _: Anonymous,
    State(state): State<AppState>,
    flashes: Flashes,
    Form(mut form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    form.normalize();
    let mut errors = form.validate();

    if errors.get("username").is_none()
        && state.users.find_by_username(&form.username).await?.is_some()
    {
        errors.add("username", USERNAME_TAKEN);
    }
    if errors.get("email").is_none() && state.users.find_by_email(&form.email).await?.is_some() {
        errors.add("email", EMAIL_TAKEN);
    }
    if !errors.is_empty() {
        warn!(username = %form.username, ?errors, "registration rejected");
        return Ok(register_view(flashes, &form.username, &form.email, errors));
    }

    let hash = hash_password(&form.password)?;
    let created = state
        .users
        .create(NewUser {
            username: &form.username,
            email: &form.email,
            password_hash: &hash,
        })
        .await;
    let user = match created {
        Ok(user) => user,
        Err(e) => match duplicate_error(&e) {
            Some(errors) => {
                warn!(username = %form.username, ?errors, "registration lost unique race");
                return Ok(register_view(flashes, &form.username, &form.email, errors));
            }
            None => return Err(e.into()),
        },
    };

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(flashes.redirect_with("/login", Category::Success, REGISTERED))
}

// --- login / logout ---

fn login_view(
    flashes: Flashes,
    next: &str,
    email: &str,
    remember: bool,
    errors: FieldErrors,
) -> Response {
    render(
        form_status(&errors),
        "login",
        "Login",
        flashes,
        json!({
            "next": next,
            "form": { "email": email, "remember": remember },
            "errors": errors,
        }),
    )
}

pub async fn login_page(
    _: Anonymous,
    Query(query): Query<NextQuery>,
    flashes: Flashes,
) -> Response {
    let next = safe_next(query.next.as_deref());
    login_view(flashes, next, "", false, FieldErrors::default())
}

#[instrument(skip_all)]
pub async fn login(
    _: Anonymous,
    State(state): State<AppState>,
    Query(query): Query<NextQuery>,
    mut flashes: Flashes,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let email = form.email.trim();
    let target = safe_next(query.next.as_deref());
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(login_view(flashes, target, email, form.remember(), errors));
    }

    let user = state.users.find_by_email(email).await?;
    let authenticated = user.filter(|u| match verify_password(&form.password, &u.password_hash) {
        Ok(ok) => ok,
        Err(e) => {
            error!(error = %e, user_id = %u.id, "stored password hash unreadable");
            false
        }
    });

    let Some(user) = authenticated else {
        warn!(%email, "login failed");
        flashes.push(Category::Danger, LOGIN_FAILED);
        return Ok(login_view(
            flashes,
            target,
            email,
            form.remember(),
            FieldErrors::default(),
        ));
    };

    let cookie = state
        .jwt
        .session_cookie(user.id, form.remember(), state.config.cookie_secure)?;
    if query.next.as_deref().is_some_and(|n| n != target) {
        warn!(next = ?query.next, "ignoring unsafe next target");
    }

    info!(user_id = %user.id, remember = form.remember(), "user logged in");
    let mut res = flashes.redirect(target);
    res.headers_mut().append(SET_COOKIE, cookie);
    Ok(res)
}

#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Response {
    let mut res = Redirect::to("/").into_response();
    res.headers_mut().append(
        SET_COOKIE,
        cookies::clear_cookie(SESSION_COOKIE, state.config.cookie_secure),
    );
    res
}

// --- account ---

fn account_view(
    state: &AppState,
    flashes: Flashes,
    user: &User,
    username: &str,
    email: &str,
    errors: FieldErrors,
) -> Response {
    render(
        form_status(&errors),
        "account",
        "Account",
        flashes,
        json!({
            "image_file": state.config.picture_url(&user.image_file),
            "form": { "username": username, "email": email },
            "errors": errors,
        }),
    )
}

pub async fn account_page(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    flashes: Flashes,
) -> Response {
    account_view(
        &state,
        flashes,
        &user,
        &user.username,
        &user.email,
        FieldErrors::default(),
    )
}

async fn read_account_form(mut mp: Multipart) -> Result<AccountForm, MultipartError> {
    let mut form = AccountForm::default();
    while let Some(field) = mp.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "username" => form.username = field.text().await?.trim().to_string(),
            "email" => form.email = field.text().await?.trim().to_string(),
            "picture" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let body = field.bytes().await?;
                // browsers send an empty part when no file was chosen
                if let Some(file_name) = file_name.filter(|n| !n.is_empty()) {
                    if !body.is_empty() {
                        form.picture = Some(PictureUpload {
                            file_name,
                            content_type,
                            body,
                        });
                    }
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

#[instrument(skip_all)]
pub async fn update_account(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    flashes: Flashes,
    mp: Multipart,
) -> Result<Response, AppError> {
    let form = match read_account_form(mp).await {
        Ok(form) => form,
        Err(e) => {
            warn!(error = %e, "unreadable account form");
            return Ok((StatusCode::BAD_REQUEST, e.to_string()).into_response());
        }
    };

    let mut errors = form.validate();
    if errors.get("username").is_none()
        && form.username != user.username
        && state.users.find_by_username(&form.username).await?.is_some()
    {
        errors.add("username", USERNAME_TAKEN);
    }
    if errors.get("email").is_none()
        && form.email != user.email
        && state.users.find_by_email(&form.email).await?.is_some()
    {
        errors.add("email", EMAIL_TAKEN);
    }
    if !errors.is_empty() {
        return Ok(account_view(
            &state,
            flashes,
            &user,
            &form.username,
            &form.email,
            errors,
        ));
    }

    let new_image = match form.picture {
        Some(picture) => Some(save_picture(state.storage.as_ref(), picture).await?),
        None => None,
    };

    let updated = state
        .users
        .update_profile(
            user.id,
            ProfileUpdate {
                username: &form.username,
                email: &form.email,
                image_file: new_image.as_deref(),
            },
        )
        .await;

    let updated = match updated {
        Ok(u) => u,
        Err(e) => {
            // the picture is orphaned once the row keeps its old image
            if let Some(image_file) = &new_image {
                if let Err(de) = discard_picture(state.storage.as_ref(), image_file).await {
                    error!(error = %de, %image_file, "could not remove orphaned picture");
                }
            }
            return match duplicate_error(&e) {
                Some(errors) => Ok(account_view(
                    &state,
                    flashes,
                    &user,
                    &form.username,
                    &form.email,
                    errors,
                )),
                None => Err(e.into()),
            };
        }
    };

    info!(
        user_id = %updated.id,
        username = %updated.username,
        new_picture = new_image.is_some(),
        "account updated"
    );
    Ok(flashes.redirect_with("/account", Category::Success, ACCOUNT_UPDATED))
}

// --- author listing ---

#[instrument(skip_all)]
pub async fn user_posts(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
    flashes: Flashes,
) -> Result<Response, AppError> {
    let page_no = query
        .page
        .as_deref()
        .and_then(|p| p.trim().parse::<i64>().ok())
        .unwrap_or(1);

    let user = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;
    let posts = author_page(
        state.posts.as_ref(),
        user.id,
        page_no,
        state.config.posts_per_page,
    )
    .await?
    .ok_or(AppError::NotFound)?;

    Ok(page(
        "user_posts",
        user.username.clone(),
        flashes,
        json!({
            "user": {
                "username": user.username,
                "image_file": state.config.picture_url(&user.image_file),
            },
            "posts": posts,
        }),
    ))
}

// --- password reset ---

fn reset_request_view(flashes: Flashes, email: &str, errors: FieldErrors) -> Response {
    render(
        form_status(&errors),
        "reset_request",
        "Reset Password",
        flashes,
        json!({ "form": { "email": email }, "errors": errors }),
    )
}

pub async fn reset_request_page(_: Anonymous, flashes: Flashes) -> Response {
    reset_request_view(flashes, "", FieldErrors::default())
}

#[instrument(skip_all)]
pub async fn reset_request(
    _: Anonymous,
    State(state): State<AppState>,
    flashes: Flashes,
    Form(form): Form<RequestResetForm>,
) -> Result<Response, AppError> {
    let email = form.email.trim();
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(reset_request_view(flashes, email, errors));
    }

    match state.users.find_by_email(email).await? {
        Some(user) => {
            let token = state.jwt.issue_reset(user.id)?;
            let url = format!("{}/reset_password/{}", state.config.public_url, token);
            state.mailer.send_password_reset(&user, &url).await?;
            info!(user_id = %user.id, "password reset requested");
        }
        None => warn!(%email, "password reset for unknown email"),
    }
    Ok(flashes.redirect_with("/login", Category::Info, RESET_SENT))
}

/// User a reset token was issued for, or `None` when the token is unusable
/// or the account is gone.
async fn reset_target(state: &AppState, token: &str) -> Result<Option<User>, AppError> {
    match state.jwt.verify_reset(token) {
        Some(user_id) => Ok(state.users.find_by_id(user_id).await?),
        None => Ok(None),
    }
}

fn reset_token_view(flashes: Flashes, errors: FieldErrors) -> Response {
    render(
        form_status(&errors),
        "reset_token",
        "Reset Password",
        flashes,
        json!({ "errors": errors }),
    )
}

pub async fn reset_token_page(
    _: Anonymous,
    State(state): State<AppState>,
    Path(token): Path<String>,
    flashes: Flashes,
) -> Result<Response, AppError> {
    if reset_target(&state, &token).await?.is_none() {
        return Ok(flashes.redirect_with("/reset_password", Category::Warning, INVALID_TOKEN));
    }
    Ok(reset_token_view(flashes, FieldErrors::default()))
}

#[instrument(skip_all)]
pub async fn reset_password(
    _: Anonymous,
    State(state): State<AppState>,
    Path(token): Path<String>,
    flashes: Flashes,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response, AppError> {
    let Some(user) = reset_target(&state, &token).await? else {
        return Ok(flashes.redirect_with("/reset_password", Category::Warning, INVALID_TOKEN));
    };

    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(reset_token_view(flashes, errors));
    }

    let hash = hash_password(&form.password)?;
    state.users.update_password(user.id, &hash).await?;

    info!(user_id = %user.id, "password reset");
    Ok(flashes.redirect_with("/login", Category::Success, PASSWORD_UPDATED))
}
